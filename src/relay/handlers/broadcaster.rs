use std::ops::ControlFlow;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};

use super::CloseReason;
use crate::error::RelayError;
use crate::protocol::{decode, BroadcasterMessage, ServerMessage};
use crate::registry::Location;
use crate::relay::{Delivery, PeerHandle, Relay};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BroadcasterState {
    /// Connected, no session yet
    Idle,
    /// Owns a registered session
    Active,
    Closed,
}

/// Control loop for `/ws/broadcast/:stream_id`
pub struct BroadcasterConnection {
    relay: Arc<Relay>,
    stream_id: String,
    peer: PeerHandle,
    state: BroadcasterState,
}

impl BroadcasterConnection {
    pub fn new(relay: Arc<Relay>, stream_id: impl Into<String>, peer: PeerHandle) -> Self {
        Self {
            relay,
            stream_id: stream_id.into(),
            peer,
            state: BroadcasterState::Idle,
        }
    }

    /// Run until `stop_stream`, disconnect, a malformed frame, or a failed
    /// reply. Teardown runs exactly once on the way out.
    pub async fn run<S>(mut self, mut inbound: S) -> CloseReason
    where
        S: Stream<Item = String> + Unpin,
    {
        info!(stream_id = %self.stream_id, peer = %self.peer.id(), "Broadcaster connected");

        let reason = loop {
            let Some(frame) = inbound.next().await else {
                break CloseReason::Disconnected;
            };

            let message = match decode::<BroadcasterMessage>(&frame) {
                Ok(message) => message,
                Err(e) => {
                    warn!(stream_id = %self.stream_id, "Dropping broadcaster: {}", e);
                    break CloseReason::from(e);
                }
            };

            match self.handle(message).await {
                Ok(ControlFlow::Continue(())) => {}
                Ok(ControlFlow::Break(())) => break CloseReason::Stopped,
                Err(e) => break CloseReason::from(e),
            }
        };

        self.teardown().await;
        info!(stream_id = %self.stream_id, ?reason, "Broadcaster closed");
        reason
    }

    async fn handle(&mut self, message: BroadcasterMessage) -> Result<ControlFlow<()>, RelayError> {
        match (self.state, message) {
            (_, BroadcasterMessage::StopStream) => return Ok(ControlFlow::Break(())),

            (_, BroadcasterMessage::StartStream {
                latitude,
                longitude,
                notes,
            }) => {
                self.start(Location::new(latitude, longitude), &notes).await?;
            }

            (BroadcasterState::Active, BroadcasterMessage::UpdateLocation {
                latitude,
                longitude,
            }) => {
                self.ensure_owner().await?;
                let location = Location::new(latitude, longitude);
                if self
                    .relay
                    .registry()
                    .update_location(&self.stream_id, location)
                    .await
                {
                    self.relay.notifier().broadcast_list().await;
                }
            }

            (BroadcasterState::Active, BroadcasterMessage::Offer { sdp, .. }) => {
                self.ensure_owner().await?;
                let offer = ServerMessage::Offer {
                    sdp,
                    stream_id: self.stream_id.clone(),
                };
                self.relay.router().fan_out(&self.stream_id, &offer).await;
            }

            (BroadcasterState::Active, BroadcasterMessage::IceCandidate { candidate }) => {
                self.ensure_owner().await?;
                let candidate = ServerMessage::IceCandidate {
                    candidate,
                    stream_id: Some(self.stream_id.clone()),
                    viewer_id: None,
                };
                self.relay.router().fan_out(&self.stream_id, &candidate).await;
            }

            (_, BroadcasterMessage::Unknown) => {
                debug!(stream_id = %self.stream_id, "Ignoring unrecognized message type");
            }

            (state, message) => {
                debug!(stream_id = %self.stream_id, ?state, ?message, "Ignoring message before start_stream");
            }
        }

        Ok(ControlFlow::Continue(()))
    }

    async fn start(&mut self, location: Location, notes: &str) -> Result<(), RelayError> {
        let created = self
            .relay
            .registry()
            .create_session(&self.stream_id, location, notes, self.peer.clone())
            .await;

        match created {
            Ok(_) => {
                self.state = BroadcasterState::Active;
                self.reply(&ServerMessage::StreamStarted {
                    stream_id: self.stream_id.clone(),
                })?;
                self.relay.notifier().broadcast_list().await;
                Ok(())
            }
            Err(RelayError::AlreadyExists(id)) => {
                warn!(stream_id = %id, peer = %self.peer.id(), "Rejecting duplicate start_stream");
                self.reply(&ServerMessage::error(format!("Stream {} is already active", id)))
            }
            Err(e) => Err(e),
        }
    }

    /// The session can be ended from outside (server shutdown), after which
    /// another connection may own the id
    async fn ensure_owner(&self) -> Result<(), RelayError> {
        if self
            .relay
            .registry()
            .is_owner(&self.stream_id, self.peer.id())
            .await
        {
            Ok(())
        } else {
            info!(stream_id = %self.stream_id, peer = %self.peer.id(), "Session no longer owned");
            Err(RelayError::NotFound(self.stream_id.clone()))
        }
    }

    fn reply(&self, message: &ServerMessage) -> Result<(), RelayError> {
        match self.peer.send(message) {
            Delivery::Failed(id) => Err(RelayError::PeerUnreachable(id)),
            _ => Ok(()),
        }
    }

    async fn teardown(&mut self) {
        let was_active = self.state == BroadcasterState::Active;
        self.state = BroadcasterState::Closed;
        if !was_active {
            return;
        }

        let removed = self
            .relay
            .registry()
            .remove_session(&self.stream_id, self.peer.id())
            .await;

        if let Some(removed) = removed {
            let ended = ServerMessage::StreamEnded {
                stream_id: self.stream_id.clone(),
            };
            let notified = removed
                .viewers
                .iter()
                .filter(|viewer| viewer.send(&ended).is_sent())
                .count();
            info!(
                stream_id = %self.stream_id,
                viewers = removed.viewers.len(),
                notified,
                "Stream ended"
            );
            self.relay.notifier().broadcast_list().await;
        }
    }
}
