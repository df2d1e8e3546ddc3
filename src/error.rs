use thiserror::Error;

use crate::relay::PeerId;

/// Failures scoped to a single connection or session
///
/// None of these are fatal to the process. Handlers decide per variant:
/// - `NotFound` / `AlreadyExists` → ignored or answered with an `error` message
/// - `PeerUnreachable` → the peer is pruned, the sender carries on
/// - `MalformedMessage` / `TransportClosed` → the owning connection tears down
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RelayError {
    #[error("stream {0} not found")]
    NotFound(String),

    #[error("stream {0} is already active")]
    AlreadyExists(String),

    #[error("peer {0} is unreachable")]
    PeerUnreachable(PeerId),

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("transport closed")]
    TransportClosed,
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::MalformedMessage(e.to_string())
    }
}
