// Storage plumbing shared by the settings repository and the identity store

pub mod backend;

pub use backend::{MemoryStorage, SledStorage, StorageBackend};
