// Node identity lifecycle and the active-identity stream

mod keys;
mod store;

pub use keys::{IdentityKeys, DESTINATION_HASH_LEN};
pub use store::IdentityStore;

use anyhow::Result;
use tokio::sync::watch;

/// Manages the node's identity keys and publishes the active identity.
///
/// The active-identity stream is `None` until `initialize()` runs and `None`
/// again after `clear()`. Consumers that gate work on identity presence (the
/// announce scheduler, message codecs) sample or subscribe to this stream
/// instead of holding their own copy of the keys.
pub struct IdentityManager {
    store: IdentityStore,
    active_tx: watch::Sender<Option<IdentityKeys>>,
}

impl IdentityManager {
    /// Identity manager with in-memory storage
    pub fn new() -> Self {
        Self {
            store: IdentityStore::memory(),
            active_tx: watch::channel(None).0,
        }
    }

    /// Identity manager with persistent storage
    pub fn with_store(store: IdentityStore) -> Self {
        Self {
            store,
            active_tx: watch::channel(None).0,
        }
    }

    /// Load existing keys or generate fresh ones, then publish them as active.
    pub fn initialize(&self) -> Result<()> {
        let keys = if let Some(keys) = self.store.load_keys()? {
            tracing::info!(destination = %keys.destination_hash_hex(), "🔑 Loaded existing identity");
            keys
        } else {
            let keys = IdentityKeys::generate();
            tracing::info!(destination = %keys.destination_hash_hex(), "🔑 Generated new identity");
            self.store.save_keys(&keys)?;
            keys
        };

        self.active_tx.send_replace(Some(keys));
        Ok(())
    }

    /// Reactive stream of the currently active identity
    pub fn active_identity(&self) -> watch::Receiver<Option<IdentityKeys>> {
        self.active_tx.subscribe()
    }

    /// Snapshot of the active identity, if any
    pub fn active(&self) -> Option<IdentityKeys> {
        self.active_tx.borrow().clone()
    }

    /// Destination hash of the active identity as hex
    pub fn destination_hash_hex(&self) -> Option<String> {
        self.active_tx.borrow().as_ref().map(|k| k.destination_hash_hex())
    }

    /// Sign data with the active identity
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self.active_tx.borrow().as_ref() {
            Some(keys) => keys.sign(data),
            None => Err(anyhow::anyhow!("Identity not initialized")),
        }
    }

    pub fn set_display_name(&self, name: &str) -> Result<()> {
        self.store.save_display_name(name)
    }

    pub fn display_name(&self) -> Result<Option<String>> {
        self.store.load_display_name()
    }

    /// Wipe stored keys and retract the active identity
    pub fn clear(&self) -> Result<()> {
        self.store.clear()?;
        self.active_tx.send_replace(None);
        tracing::info!("identity cleared");
        Ok(())
    }
}

impl Default for IdentityManager {
    fn default() -> Self {
        Self::new()
    }
}
