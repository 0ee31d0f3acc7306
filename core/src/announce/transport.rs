// Binding seam to the protocol stack

use crate::identity::IdentityKeys;
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by the protocol binding during an announce
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("Protocol stack not ready")]
    NotReady,
    #[error("Announce failed: {0}")]
    AnnounceFailed(String),
}

/// Narrow async seam to the protocol stack for presence announces.
///
/// The running service hands the scheduler an implementation that forwards to
/// the mesh stack; tests substitute their own. Implementations may suspend on
/// network I/O. A returned error means this announce did not go out; the
/// scheduler treats that as routine and keeps its cadence.
#[async_trait]
pub trait AnnounceTransport: Send + Sync {
    /// Broadcast the identity's presence onto the mesh.
    async fn broadcast_presence(&self, identity: &IdentityKeys) -> Result<(), TransportError>;
}
