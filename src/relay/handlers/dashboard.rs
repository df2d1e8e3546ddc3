use std::sync::Arc;

use futures::{Stream, StreamExt};
use tracing::{info, trace};

use super::CloseReason;
use crate::error::RelayError;
use crate::relay::{Delivery, PeerHandle, Relay};

/// Control loop for `/ws/dashboard`
pub struct DashboardConnection {
    relay: Arc<Relay>,
    peer: PeerHandle,
}

impl DashboardConnection {
    pub fn new(relay: Arc<Relay>, peer: PeerHandle) -> Self {
        Self { relay, peer }
    }

    /// Subscribe, send one snapshot, then discard keepalives until the
    /// transport closes.
    pub async fn run<S>(self, mut inbound: S) -> CloseReason
    where
        S: Stream<Item = String> + Unpin,
    {
        let notifier = self.relay.notifier();
        let id = self.peer.id();

        // Subscribe before snapshotting so no update falls in between
        notifier.subscribe(self.peer.clone()).await;
        info!(dashboard = %id, "Dashboard connected");

        let snapshot = notifier.stream_list().await;
        let reason = match self.peer.send(&snapshot) {
            Delivery::Failed(id) => CloseReason::Failed(RelayError::PeerUnreachable(id)),
            _ => {
                while let Some(frame) = inbound.next().await {
                    trace!(dashboard = %id, len = frame.len(), "Dashboard frame ignored");
                }
                CloseReason::Disconnected
            }
        };

        notifier.unsubscribe(id).await;
        info!(dashboard = %id, ?reason, "Dashboard closed");
        reason
    }
}
