use std::sync::Arc;

use tracing::{debug, warn};

use super::peer::{Delivery, PeerHandle, PeerId};
use crate::protocol::ServerMessage;
use crate::registry::SessionRegistry;

/// Result of forwarding one message to every viewer of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    /// Viewers whose send failed and were detached
    pub pruned: usize,
}

/// Forwards signaling messages along the broadcaster ↔ viewer edge
///
/// Recipients are resolved through the registry on every call, so an id that
/// is no longer active never receives anything.
#[derive(Clone)]
pub struct MessageRouter {
    registry: Arc<SessionRegistry>,
}

impl MessageRouter {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Best-effort send to every viewer of `stream_id`
    ///
    /// A viewer that cannot be reached is detached; the others still receive
    /// the message.
    pub async fn fan_out(&self, stream_id: &str, message: &ServerMessage) -> FanOut {
        let mut result = FanOut::default();

        let Some(viewers) = self.registry.get_viewers(stream_id).await else {
            return result;
        };

        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!(stream_id = %stream_id, "Failed to encode message: {}", e);
                return result;
            }
        };

        for viewer in viewers {
            match viewer.send_text(text.clone()) {
                Delivery::Sent => result.delivered += 1,
                Delivery::Failed(id) => {
                    warn!(stream_id = %stream_id, viewer = %id, "Viewer unreachable, detaching");
                    self.registry.detach_viewer(stream_id, id).await;
                    result.pruned += 1;
                }
                Delivery::NoRecipient => {}
            }
        }

        debug!(
            stream_id = %stream_id,
            delivered = result.delivered,
            pruned = result.pruned,
            "Fanned out to viewers"
        );
        result
    }

    /// Best-effort send to the broadcaster of `stream_id`
    pub async fn to_broadcaster(&self, stream_id: &str, message: &ServerMessage) -> Delivery {
        let broadcaster = self.registry.get_broadcaster(stream_id).await;
        send_to_broadcaster(stream_id, broadcaster, message)
    }

    /// Like [`to_broadcaster`](Self::to_broadcaster), on behalf of `viewer`
    ///
    /// `NoRecipient` unless `viewer` is still attached to `stream_id`; a
    /// detached viewer never reaches the session's current owner.
    pub async fn to_broadcaster_from(
        &self,
        stream_id: &str,
        viewer: PeerId,
        message: &ServerMessage,
    ) -> Delivery {
        let broadcaster = self.registry.broadcaster_for(stream_id, viewer).await;
        if broadcaster.is_none() {
            debug!(stream_id = %stream_id, viewer = %viewer, "Viewer not attached, dropping message");
        }
        send_to_broadcaster(stream_id, broadcaster, message)
    }
}

fn send_to_broadcaster(
    stream_id: &str,
    broadcaster: Option<PeerHandle>,
    message: &ServerMessage,
) -> Delivery {
    let Some(broadcaster) = broadcaster else {
        return Delivery::NoRecipient;
    };

    let delivery = broadcaster.send(message);
    if let Delivery::Failed(id) = delivery {
        warn!(stream_id = %stream_id, broadcaster = %id, "Broadcaster unreachable");
    }
    delivery
}
