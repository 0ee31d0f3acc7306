//! Persisted node settings with reactive change streams
//!
//! The repository is the service-side view of the shared preferences file:
//! the UI process edits the announce configuration, the network monitor stamps
//! `network_change_announce_time`, and the announce scheduler stamps
//! `last_auto_announce_time`. Every value is persisted through the storage
//! backend and republished on a watch channel so in-process observers react
//! without polling.

use crate::store::{MemoryStorage, StorageBackend};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

const AUTO_ANNOUNCE_ENABLED: &[u8] = b"auto_announce_enabled";
const AUTO_ANNOUNCE_INTERVAL_HOURS: &[u8] = b"auto_announce_interval_hours";
const NETWORK_CHANGE_ANNOUNCE_TIME: &[u8] = b"network_change_announce_time";
const LAST_AUTO_ANNOUNCE_TIME: &[u8] = b"last_auto_announce_time";

/// Default announce interval when nothing has been configured yet
pub const DEFAULT_ANNOUNCE_INTERVAL_HOURS: i64 = 3;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Persisted settings repository with one reactive stream per observed key.
///
/// Setters persist first, then publish. The boolean and interval streams are
/// conflated (no notification when the stored value did not change); the
/// timestamp streams republish every write, since each write is itself the
/// signal.
pub struct SettingsRepository {
    backend: Arc<dyn StorageBackend>,
    auto_announce_enabled_tx: watch::Sender<bool>,
    auto_announce_interval_hours_tx: watch::Sender<i64>,
    network_change_announce_time_tx: watch::Sender<Option<i64>>,
    last_auto_announce_time_tx: watch::Sender<Option<i64>>,
}

impl SettingsRepository {
    /// Open the repository on a storage backend, loading persisted values.
    pub fn open(backend: Arc<dyn StorageBackend>) -> Result<Self, SettingsError> {
        let enabled = load_or(&*backend, AUTO_ANNOUNCE_ENABLED, false)?;
        let interval = load_or(
            &*backend,
            AUTO_ANNOUNCE_INTERVAL_HOURS,
            DEFAULT_ANNOUNCE_INTERVAL_HOURS,
        )?;
        let network_change = load_or(&*backend, NETWORK_CHANGE_ANNOUNCE_TIME, None)?;
        let last_announce = load_or(&*backend, LAST_AUTO_ANNOUNCE_TIME, None)?;

        Ok(Self {
            backend,
            auto_announce_enabled_tx: watch::channel(enabled).0,
            auto_announce_interval_hours_tx: watch::channel(interval).0,
            network_change_announce_time_tx: watch::channel(network_change).0,
            last_auto_announce_time_tx: watch::channel(last_announce).0,
        })
    }

    /// Repository backed by in-memory storage. Nothing survives a restart.
    pub fn in_memory() -> Self {
        // MemoryStorage never fails, so open() cannot either
        Self::open(Arc::new(MemoryStorage::new())).expect("in-memory settings")
    }

    /// Whether periodic auto-announce is enabled.
    pub fn auto_announce_enabled(&self) -> watch::Receiver<bool> {
        self.auto_announce_enabled_tx.subscribe()
    }

    /// Configured announce interval in hours. Stored raw; consumers clamp.
    pub fn auto_announce_interval_hours(&self) -> watch::Receiver<i64> {
        self.auto_announce_interval_hours_tx.subscribe()
    }

    /// Timestamp (epoch millis) of the last network-change-triggered announce,
    /// written by the network monitor. `None` until one has happened.
    pub fn network_change_announce_time(&self) -> watch::Receiver<Option<i64>> {
        self.network_change_announce_time_tx.subscribe()
    }

    /// Timestamp (epoch millis) of the last completed auto-announce cycle.
    pub fn last_auto_announce_time(&self) -> watch::Receiver<Option<i64>> {
        self.last_auto_announce_time_tx.subscribe()
    }

    pub fn set_auto_announce_enabled(&self, enabled: bool) -> Result<(), SettingsError> {
        self.persist(AUTO_ANNOUNCE_ENABLED, &enabled)?;
        self.auto_announce_enabled_tx.send_if_modified(|current| {
            let changed = *current != enabled;
            *current = enabled;
            changed
        });
        debug!(enabled, "auto-announce enabled updated");
        Ok(())
    }

    pub fn set_auto_announce_interval_hours(&self, hours: i64) -> Result<(), SettingsError> {
        self.persist(AUTO_ANNOUNCE_INTERVAL_HOURS, &hours)?;
        self.auto_announce_interval_hours_tx
            .send_if_modified(|current| {
                let changed = *current != hours;
                *current = hours;
                changed
            });
        debug!(hours, "auto-announce interval updated");
        Ok(())
    }

    pub fn set_network_change_announce_time(&self, timestamp_millis: i64) -> Result<(), SettingsError> {
        self.persist(NETWORK_CHANGE_ANNOUNCE_TIME, &Some(timestamp_millis))?;
        self.network_change_announce_time_tx
            .send_replace(Some(timestamp_millis));
        Ok(())
    }

    /// Clear the network-change marker. Observers treat the `None` emission as
    /// no-signal.
    pub fn clear_network_change_announce_time(&self) -> Result<(), SettingsError> {
        self.backend
            .remove(NETWORK_CHANGE_ANNOUNCE_TIME)
            .map_err(SettingsError::Storage)?;
        self.backend.flush().map_err(SettingsError::Storage)?;
        self.network_change_announce_time_tx.send_replace(None);
        Ok(())
    }

    pub fn set_last_auto_announce_time(&self, timestamp_millis: i64) -> Result<(), SettingsError> {
        self.persist(LAST_AUTO_ANNOUNCE_TIME, &Some(timestamp_millis))?;
        self.last_auto_announce_time_tx
            .send_replace(Some(timestamp_millis));
        Ok(())
    }

    fn persist<T: Serialize>(&self, key: &[u8], value: &T) -> Result<(), SettingsError> {
        let bytes = serde_json::to_vec(value)?;
        self.backend.put(key, &bytes).map_err(SettingsError::Storage)?;
        self.backend.flush().map_err(SettingsError::Storage)?;
        Ok(())
    }
}

fn load_or<T: DeserializeOwned>(
    backend: &dyn StorageBackend,
    key: &[u8],
    default: T,
) -> Result<T, SettingsError> {
    match backend.get(key).map_err(SettingsError::Storage)? {
        Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStorage;

    #[test]
    fn test_defaults() {
        let settings = SettingsRepository::in_memory();

        assert!(!*settings.auto_announce_enabled().borrow());
        assert_eq!(
            *settings.auto_announce_interval_hours().borrow(),
            DEFAULT_ANNOUNCE_INTERVAL_HOURS
        );
        assert_eq!(*settings.network_change_announce_time().borrow(), None);
        assert_eq!(*settings.last_auto_announce_time().borrow(), None);
    }

    #[test]
    fn test_set_and_observe() {
        let settings = SettingsRepository::in_memory();
        let mut enabled = settings.auto_announce_enabled();
        let mut interval = settings.auto_announce_interval_hours();

        settings.set_auto_announce_enabled(true).unwrap();
        assert!(enabled.has_changed().unwrap());
        assert!(*enabled.borrow_and_update());

        settings.set_auto_announce_interval_hours(6).unwrap();
        assert!(interval.has_changed().unwrap());
        assert_eq!(*interval.borrow_and_update(), 6);
    }

    #[test]
    fn test_unchanged_value_is_conflated() {
        let settings = SettingsRepository::in_memory();
        let mut enabled = settings.auto_announce_enabled();

        // Default is already false; rewriting it must not notify
        settings.set_auto_announce_enabled(false).unwrap();
        assert!(!enabled.has_changed().unwrap());

        let mut interval = settings.auto_announce_interval_hours();
        settings
            .set_auto_announce_interval_hours(DEFAULT_ANNOUNCE_INTERVAL_HOURS)
            .unwrap();
        assert!(!interval.has_changed().unwrap());
    }

    #[test]
    fn test_timestamp_writes_always_notify() {
        let settings = SettingsRepository::in_memory();
        let mut network_change = settings.network_change_announce_time();

        settings.set_network_change_announce_time(1000).unwrap();
        assert!(network_change.has_changed().unwrap());
        assert_eq!(*network_change.borrow_and_update(), Some(1000));

        // Same value again still notifies; the write is the signal
        settings.set_network_change_announce_time(1000).unwrap();
        assert!(network_change.has_changed().unwrap());
    }

    #[test]
    fn test_clear_network_change_emits_none() {
        let settings = SettingsRepository::in_memory();
        settings.set_network_change_announce_time(1000).unwrap();

        let mut network_change = settings.network_change_announce_time();
        network_change.borrow_and_update();

        settings.clear_network_change_announce_time().unwrap();
        assert!(network_change.has_changed().unwrap());
        assert_eq!(*network_change.borrow_and_update(), None);
    }

    #[test]
    fn test_persistence_across_reopen() {
        let backend = Arc::new(MemoryStorage::new());

        {
            let settings = SettingsRepository::open(backend.clone()).unwrap();
            settings.set_auto_announce_enabled(true).unwrap();
            settings.set_auto_announce_interval_hours(9).unwrap();
            settings.set_last_auto_announce_time(42_000).unwrap();
        }

        let reopened = SettingsRepository::open(backend).unwrap();
        assert!(*reopened.auto_announce_enabled().borrow());
        assert_eq!(*reopened.auto_announce_interval_hours().borrow(), 9);
        assert_eq!(*reopened.last_auto_announce_time().borrow(), Some(42_000));
    }

    #[test]
    fn test_persistence_on_sled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings").to_str().unwrap().to_string();

        {
            let backend = Arc::new(crate::store::SledStorage::new(&path).unwrap());
            let settings = SettingsRepository::open(backend).unwrap();
            settings.set_auto_announce_interval_hours(12).unwrap();
            settings.set_network_change_announce_time(7_000).unwrap();
        }

        {
            let backend = Arc::new(crate::store::SledStorage::new(&path).unwrap());
            let settings = SettingsRepository::open(backend).unwrap();
            assert_eq!(*settings.auto_announce_interval_hours().borrow(), 12);
            assert_eq!(
                *settings.network_change_announce_time().borrow(),
                Some(7_000)
            );
        }
    }

    #[test]
    fn test_out_of_range_interval_is_stored_raw() {
        let settings = SettingsRepository::in_memory();

        // The repository does not validate; scheduling clamps downstream
        settings.set_auto_announce_interval_hours(-5).unwrap();
        assert_eq!(*settings.auto_announce_interval_hours().borrow(), -5);

        settings.set_auto_announce_interval_hours(100).unwrap();
        assert_eq!(*settings.auto_announce_interval_hours().borrow(), 100);
    }
}
