// LXMesh service core
//
// The service-side half of the messenger: identity, persisted settings, and
// the announce scheduler that keeps this node discoverable on the mesh. The
// protocol stack and the UI both live elsewhere; this crate meets the stack at
// the `AnnounceTransport` seam and the UI at the settings repository.

pub mod announce;
pub mod identity;
pub mod service;
pub mod settings;
pub mod store;

pub use announce::{AnnounceTransport, AutoAnnounceManager, TransportError};
pub use identity::{IdentityKeys, IdentityManager, IdentityStore};
pub use service::{MessengerService, ServiceConfig, ServiceError, ServiceState};
pub use settings::{SettingsError, SettingsRepository, DEFAULT_ANNOUNCE_INTERVAL_HOURS};
pub use store::{MemoryStorage, SledStorage, StorageBackend};
