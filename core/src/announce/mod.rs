// Presence announce scheduling and the protocol binding it drives

pub mod manager;
pub mod transport;

pub use manager::AutoAnnounceManager;
pub use transport::{AnnounceTransport, TransportError};
