//! Per-connection control loops
//!
//! Each loop reads inbound text frames from a stream (end of stream means the
//! transport closed) and writes through its own [`PeerHandle`](super::PeerHandle).
//! They know nothing about WebSockets, so tests drive them with plain channels.

mod broadcaster;
mod dashboard;
mod viewer;

pub use broadcaster::BroadcasterConnection;
pub use dashboard::DashboardConnection;
pub use viewer::ViewerConnection;

use crate::error::RelayError;

/// Why a connection loop ended
#[derive(Debug, Clone, PartialEq)]
pub enum CloseReason {
    /// Broadcaster sent `stop_stream`
    Stopped,
    /// Transport closed
    Disconnected,
    /// Dropped because of a malformed frame, unreachable peer, or rejection
    Failed(RelayError),
}

impl From<RelayError> for CloseReason {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::TransportClosed => CloseReason::Disconnected,
            other => CloseReason::Failed(other),
        }
    }
}
