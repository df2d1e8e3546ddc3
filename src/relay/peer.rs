use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::protocol::ServerMessage;

/// Relay-assigned connection identifier
///
/// Unique per connection and stable for its lifetime. Viewers are known to
/// their broadcaster by this id (`viewer_id` on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(u64);

impl PeerId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for PeerId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of one best-effort send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Queue full or closed; the peer should be treated as gone
    Failed(PeerId),
    /// Nobody to send to (e.g. the session has no broadcaster any more)
    NoRecipient,
}

impl Delivery {
    pub fn is_sent(&self) -> bool {
        matches!(self, Delivery::Sent)
    }
}

/// Sending half of a connection's outbound queue
///
/// The transport drains the other half. Sends never wait on the peer.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    id: PeerId,
    tx: mpsc::Sender<String>,
}

impl PeerHandle {
    pub fn new(id: PeerId, tx: mpsc::Sender<String>) -> Self {
        Self { id, tx }
    }

    /// Handle plus the receiver the transport writes from
    pub fn channel(id: PeerId, capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(id, tx), rx)
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn send(&self, message: &ServerMessage) -> Delivery {
        match message.to_json() {
            Ok(text) => self.send_text(text),
            Err(e) => {
                warn!(peer = %self.id, "Failed to encode message: {}", e);
                Delivery::Failed(self.id)
            }
        }
    }

    /// Send a pre-encoded frame (fan-out encodes once)
    pub fn send_text(&self, text: String) -> Delivery {
        match self.tx.try_send(text) {
            Ok(()) => Delivery::Sent,
            Err(mpsc::error::TrySendError::Full(text)) => {
                warn!(
                    peer = %self.id,
                    msg_len = text.len(),
                    "Outbound queue full, treating peer as unreachable"
                );
                Delivery::Failed(self.id)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Failed(self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_to_live_peer() {
        let (peer, mut rx) = PeerHandle::channel(PeerId::from(1), 4);
        assert_eq!(peer.send(&ServerMessage::error("boom")), Delivery::Sent);
        let text = rx.try_recv().unwrap();
        assert!(text.contains("\"type\":\"error\""));
        assert!(text.contains("boom"));
    }

    #[test]
    fn test_send_to_closed_peer_fails() {
        let (peer, rx) = PeerHandle::channel(PeerId::from(2), 4);
        drop(rx);
        assert!(peer.is_closed());
        assert_eq!(
            peer.send_text("x".to_string()),
            Delivery::Failed(PeerId::from(2))
        );
    }

    #[test]
    fn test_full_queue_fails() {
        let (peer, _rx) = PeerHandle::channel(PeerId::from(3), 1);
        assert!(peer.send_text("a".to_string()).is_sent());
        assert_eq!(
            peer.send_text("b".to_string()),
            Delivery::Failed(PeerId::from(3))
        );
    }
}
