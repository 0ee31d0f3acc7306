//! Background messenger service
//!
//! The per-process owner of the node's settings, identity, and announce
//! scheduler. Platform code creates a `MessengerService`, calls `start()`, and
//! drives the lifecycle; there is no global instance. The protocol stack is
//! injected as an `AnnounceTransport` so the service itself stays independent
//! of how the mesh is reached.

use crate::announce::{AnnounceTransport, AutoAnnounceManager};
use crate::identity::{IdentityManager, IdentityStore};
use crate::settings::SettingsRepository;
use crate::store::{MemoryStorage, SledStorage, StorageBackend};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, Clone)]
pub enum ServiceError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Service in invalid state: {0}")]
    InvalidState(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Identity error: {0}")]
    Identity(String),
}

/// Current state of the messenger service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Starting => write!(f, "Starting"),
            Self::Running => write!(f, "Running"),
            Self::Stopping => write!(f, "Stopping"),
        }
    }
}

/// Service configuration provided by platform code
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Path for persistent state (settings, identity keys)
    pub storage_path: String,
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.storage_path.trim().is_empty() {
            return Err(ServiceError::InvalidConfig(
                "storage_path cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// The service-side composition root.
///
/// Unlike the announce scheduler it owns, the service is strict about its
/// lifecycle: starting a running service or stopping a stopped one is a
/// caller bug and returns `InvalidState`.
pub struct MessengerService {
    state: Arc<RwLock<ServiceState>>,
    settings: Arc<SettingsRepository>,
    identity: Arc<IdentityManager>,
    announce: AutoAnnounceManager,
}

impl MessengerService {
    /// Create a service with sled-backed storage under `config.storage_path`.
    pub fn new(
        config: ServiceConfig,
        transport: Arc<dyn AnnounceTransport>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;

        let settings_path = format!("{}/settings", config.storage_path);
        let identity_path = format!("{}/identity", config.storage_path);

        let settings_backend: Arc<dyn StorageBackend> =
            Arc::new(SledStorage::new(&settings_path).map_err(ServiceError::Storage)?);
        let identity_backend: Arc<dyn StorageBackend> =
            Arc::new(SledStorage::new(&identity_path).map_err(ServiceError::Storage)?);

        Self::assemble(settings_backend, identity_backend, transport)
    }

    /// Create a service on in-memory storage. Useful for tests and ephemeral
    /// nodes; nothing survives the process.
    pub fn in_memory(transport: Arc<dyn AnnounceTransport>) -> Self {
        // MemoryStorage starts empty, so assembly cannot fail
        Self::assemble(
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryStorage::new()),
            transport,
        )
        .expect("in-memory service")
    }

    fn assemble(
        settings_backend: Arc<dyn StorageBackend>,
        identity_backend: Arc<dyn StorageBackend>,
        transport: Arc<dyn AnnounceTransport>,
    ) -> Result<Self, ServiceError> {
        let settings = Arc::new(
            SettingsRepository::open(settings_backend)
                .map_err(|e| ServiceError::Storage(e.to_string()))?,
        );
        let identity = Arc::new(IdentityManager::with_store(IdentityStore::persistent(
            identity_backend,
        )));
        let announce =
            AutoAnnounceManager::new(settings.clone(), identity.active_identity(), transport);

        Ok(Self {
            state: Arc::new(RwLock::new(ServiceState::Stopped)),
            settings,
            identity,
            announce,
        })
    }

    /// Start the service: load or generate the identity, then start the
    /// announce scheduler.
    ///
    /// Transitions: Stopped -> Starting -> Running
    pub fn start(&self) -> Result<(), ServiceError> {
        {
            let mut state = self.state.write();
            match *state {
                ServiceState::Stopped => *state = ServiceState::Starting,
                other => {
                    return Err(ServiceError::InvalidState(format!(
                        "Cannot start from {} state",
                        other
                    )));
                }
            }
        }

        if let Err(e) = self.identity.initialize() {
            *self.state.write() = ServiceState::Stopped;
            return Err(ServiceError::Identity(e.to_string()));
        }

        self.announce.start();

        *self.state.write() = ServiceState::Running;
        info!("messenger service running");
        Ok(())
    }

    /// Stop the service and its background work.
    ///
    /// Transitions: Running -> Stopping -> Stopped
    pub fn stop(&self) -> Result<(), ServiceError> {
        {
            let mut state = self.state.write();
            match *state {
                ServiceState::Running => *state = ServiceState::Stopping,
                other => {
                    return Err(ServiceError::InvalidState(format!(
                        "Cannot stop from {} state",
                        other
                    )));
                }
            }
        }

        self.announce.stop();

        *self.state.write() = ServiceState::Stopped;
        info!("messenger service stopped");
        Ok(())
    }

    /// Record that a network topology change triggered an immediate announce.
    ///
    /// Writing the stamp through the settings repository is what nudges the
    /// periodic scheduler to restart its timer, in this process and in any
    /// other process watching the same store.
    pub fn record_network_change(&self) -> Result<(), ServiceError> {
        self.settings
            .set_network_change_announce_time(now_millis())
            .map_err(|e| ServiceError::Storage(e.to_string()))
    }

    pub fn state(&self) -> ServiceState {
        *self.state.read()
    }

    pub fn settings(&self) -> Arc<SettingsRepository> {
        self.settings.clone()
    }

    pub fn identity(&self) -> Arc<IdentityManager> {
        self.identity.clone()
    }

    /// The announce scheduler, e.g. for an explicit timer reset from the UI
    pub fn announce(&self) -> &AutoAnnounceManager {
        &self.announce
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
