use std::sync::Arc;

use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};

use super::CloseReason;
use crate::error::RelayError;
use crate::protocol::{decode, ServerMessage, ViewerMessage};
use crate::relay::{Delivery, PeerHandle, Relay};

/// Control loop for `/ws/view/:stream_id`
pub struct ViewerConnection {
    relay: Arc<Relay>,
    stream_id: String,
    peer: PeerHandle,
}

impl ViewerConnection {
    pub fn new(relay: Arc<Relay>, stream_id: impl Into<String>, peer: PeerHandle) -> Self {
        Self {
            relay,
            stream_id: stream_id.into(),
            peer,
        }
    }

    /// Attach to the session, relay answers and candidates to its
    /// broadcaster, detach on the way out.
    ///
    /// An unknown stream id gets an `error` frame and never attaches. Once the
    /// viewer is no longer attached (stream ended, or pruned as unreachable)
    /// its next frame ends the loop instead of being forwarded.
    pub async fn run<S>(self, mut inbound: S) -> CloseReason
    where
        S: Stream<Item = String> + Unpin,
    {
        let viewer_id = self.peer.id();

        if !self
            .relay
            .registry()
            .attach_viewer(&self.stream_id, self.peer.clone())
            .await
        {
            info!(stream_id = %self.stream_id, viewer = %viewer_id, "Viewer rejected: stream not found");
            self.peer.send(&ServerMessage::error("Stream not found"));
            return CloseReason::Failed(RelayError::NotFound(self.stream_id.clone()));
        }

        info!(stream_id = %self.stream_id, viewer = %viewer_id, "Viewer attached");

        let reason = match self.forward(&ServerMessage::ViewerJoined { viewer_id }).await {
            Err(e) => CloseReason::from(e),
            Ok(()) => loop {
                let Some(frame) = inbound.next().await else {
                    break CloseReason::Disconnected;
                };

                let forwarded = match decode::<ViewerMessage>(&frame) {
                    Ok(ViewerMessage::Answer { sdp }) => {
                        self.forward(&ServerMessage::Answer { sdp, viewer_id }).await
                    }
                    Ok(ViewerMessage::IceCandidate { candidate }) => {
                        self.forward(&ServerMessage::IceCandidate {
                            candidate,
                            stream_id: None,
                            viewer_id: Some(viewer_id),
                        })
                        .await
                    }
                    Ok(ViewerMessage::Unknown) => {
                        debug!(stream_id = %self.stream_id, viewer = %viewer_id, "Ignoring unrecognized message type");
                        Ok(())
                    }
                    Err(e) => {
                        warn!(stream_id = %self.stream_id, viewer = %viewer_id, "Dropping viewer: {}", e);
                        Err(e)
                    }
                };

                if let Err(e) = forwarded {
                    break CloseReason::from(e);
                }
            },
        };

        self.relay
            .registry()
            .detach_viewer(&self.stream_id, viewer_id)
            .await;
        info!(stream_id = %self.stream_id, viewer = %viewer_id, ?reason, "Viewer closed");
        reason
    }

    /// Send to the broadcaster while this viewer is still attached
    ///
    /// Detached means the session ended or the viewer was pruned; either way
    /// the loop is over.
    async fn forward(&self, message: &ServerMessage) -> Result<(), RelayError> {
        let delivery = self
            .relay
            .router()
            .to_broadcaster_from(&self.stream_id, self.peer.id(), message)
            .await;

        match delivery {
            Delivery::NoRecipient => {
                info!(stream_id = %self.stream_id, viewer = %self.peer.id(), "Viewer no longer attached");
                Err(RelayError::NotFound(self.stream_id.clone()))
            }
            // The broadcaster's own loop handles its failure
            Delivery::Sent | Delivery::Failed(_) => Ok(()),
        }
    }
}
