// Identity persistence

use super::IdentityKeys;
use crate::store::StorageBackend;
use anyhow::Result;
use std::sync::Arc;

const IDENTITY_KEYS: &[u8] = b"identity_keys";
const DISPLAY_NAME: &[u8] = b"identity_display_name";

/// Storage for the node's identity keys and display name
pub enum IdentityStore {
    Memory,
    Persistent(Arc<dyn StorageBackend>),
}

impl IdentityStore {
    pub fn memory() -> Self {
        Self::Memory
    }

    pub fn persistent(backend: Arc<dyn StorageBackend>) -> Self {
        Self::Persistent(backend)
    }

    /// Save the key material. The serialized blob carries both secret keys.
    pub fn save_keys(&self, keys: &IdentityKeys) -> Result<()> {
        match self {
            Self::Memory => Ok(()),
            Self::Persistent(db) => {
                let bytes = keys.to_bytes();
                db.put(IDENTITY_KEYS, &bytes)
                    .map_err(|e| anyhow::anyhow!(e))?;
                db.flush().map_err(|e| anyhow::anyhow!(e))?;
                Ok(())
            }
        }
    }

    pub fn load_keys(&self) -> Result<Option<IdentityKeys>> {
        match self {
            Self::Memory => Ok(None),
            Self::Persistent(db) => {
                match db.get(IDENTITY_KEYS).map_err(|e| anyhow::anyhow!(e))? {
                    Some(bytes) => Ok(Some(IdentityKeys::from_bytes(&bytes)?)),
                    None => Ok(None),
                }
            }
        }
    }

    /// Display name shown alongside announces
    pub fn save_display_name(&self, name: &str) -> Result<()> {
        match self {
            Self::Memory => Ok(()),
            Self::Persistent(db) => {
                db.put(DISPLAY_NAME, name.as_bytes())
                    .map_err(|e| anyhow::anyhow!(e))?;
                db.flush().map_err(|e| anyhow::anyhow!(e))?;
                Ok(())
            }
        }
    }

    pub fn load_display_name(&self) -> Result<Option<String>> {
        match self {
            Self::Memory => Ok(None),
            Self::Persistent(db) => {
                match db.get(DISPLAY_NAME).map_err(|e| anyhow::anyhow!(e))? {
                    Some(bytes) => Ok(Some(String::from_utf8(bytes)?)),
                    None => Ok(None),
                }
            }
        }
    }

    /// Remove all stored identity material
    pub fn clear(&self) -> Result<()> {
        match self {
            Self::Memory => Ok(()),
            Self::Persistent(db) => {
                db.remove(IDENTITY_KEYS).map_err(|e| anyhow::anyhow!(e))?;
                db.remove(DISPLAY_NAME).map_err(|e| anyhow::anyhow!(e))?;
                db.flush().map_err(|e| anyhow::anyhow!(e))?;
                Ok(())
            }
        }
    }
}
