// Storage abstraction for service-side persistence
//
// The settings repository and the identity store both sit on this trait so
// tests can run against MemoryStorage while the running service uses sled.
// The preferences written here are the node's cross-process surface: each key
// is one atomic write, visible to any reader of the same backing file.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Unified key-value storage trait for service-side persistence
pub trait StorageBackend: Send + Sync {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), String>;
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, String>;
    fn remove(&self, key: &[u8]) -> Result<(), String>;
    fn flush(&self) -> Result<(), String>;
}

/// In-memory storage useful for testing and ephemeral nodes
#[derive(Clone)]
pub struct MemoryStorage {
    data: Arc<RwLock<HashMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryStorage {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), String> {
        self.data
            .write()
            .unwrap()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, String> {
        Ok(self.data.read().unwrap().get(key).cloned())
    }

    fn remove(&self, key: &[u8]) -> Result<(), String> {
        self.data.write().unwrap().remove(key);
        Ok(())
    }

    fn flush(&self) -> Result<(), String> {
        Ok(())
    }
}

pub struct SledStorage {
    db: sled::Db,
}

impl SledStorage {
    pub fn new(path: &str) -> std::result::Result<Self, String> {
        let db = sled::open(path).map_err(|e| e.to_string())?;
        Ok(Self { db })
    }
}

impl StorageBackend for SledStorage {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), String> {
        self.db.insert(key, value).map_err(|e| e.to_string())?;
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, String> {
        let value = self.db.get(key).map_err(|e| e.to_string())?;
        Ok(value.map(|ivec| ivec.to_vec()))
    }

    fn remove(&self, key: &[u8]) -> Result<(), String> {
        self.db.remove(key).map_err(|e| e.to_string())?;
        Ok(())
    }

    fn flush(&self) -> Result<(), String> {
        self.db.flush().map_err(|e| e.to_string())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();

        storage.put(b"key", b"value").unwrap();
        assert_eq!(storage.get(b"key").unwrap(), Some(b"value".to_vec()));

        storage.remove(b"key").unwrap();
        assert_eq!(storage.get(b"key").unwrap(), None);
    }

    #[test]
    fn test_sled_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv").to_str().unwrap().to_string();

        let storage = SledStorage::new(&path).unwrap();
        storage.put(b"key", b"value").unwrap();
        storage.flush().unwrap();

        assert_eq!(storage.get(b"key").unwrap(), Some(b"value".to_vec()));
    }

    #[test]
    fn test_sled_storage_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv").to_str().unwrap().to_string();

        {
            let storage = SledStorage::new(&path).unwrap();
            storage.put(b"key", b"value").unwrap();
            storage.flush().unwrap();
        }

        {
            let storage = SledStorage::new(&path).unwrap();
            assert_eq!(storage.get(b"key").unwrap(), Some(b"value".to_vec()));
        }
    }
}
