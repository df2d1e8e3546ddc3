use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::peer::{Delivery, PeerHandle, PeerId};
use crate::protocol::ServerMessage;
use crate::registry::{Location, SessionRegistry};

/// Pushes registry snapshots and alerts to every dashboard connection
pub struct DashboardNotifier {
    registry: Arc<SessionRegistry>,
    dashboards: RwLock<Vec<PeerHandle>>,
}

impl DashboardNotifier {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            dashboards: RwLock::new(Vec::new()),
        }
    }

    pub async fn subscribe(&self, dashboard: PeerHandle) {
        info!(dashboard = %dashboard.id(), "Dashboard subscribed");
        self.dashboards.write().await.push(dashboard);
    }

    pub async fn unsubscribe(&self, id: PeerId) -> bool {
        let mut dashboards = self.dashboards.write().await;
        let before = dashboards.len();
        dashboards.retain(|d| d.id() != id);
        dashboards.len() != before
    }

    pub async fn len(&self) -> usize {
        self.dashboards.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Current registry state as a `stream_list` message
    pub async fn stream_list(&self) -> ServerMessage {
        let (streams, past_streams) = self.registry.snapshot().await;
        ServerMessage::StreamList {
            streams,
            past_streams,
        }
    }

    /// Send the current registry state to every dashboard
    ///
    /// Call after the mutation has completed so the snapshot reflects it.
    pub async fn broadcast_list(&self) -> usize {
        let message = self.stream_list().await;
        self.broadcast(&message).await
    }

    /// Send a classifier detection to every dashboard
    pub async fn broadcast_alert(
        &self,
        stream_id: &str,
        location: Location,
        threat_type: &str,
    ) -> usize {
        info!(stream_id = %stream_id, threat = %threat_type, "Broadcasting alert");
        let message = ServerMessage::Alert {
            stream_id: stream_id.to_string(),
            latitude: location.latitude,
            longitude: location.longitude,
            threat_type: threat_type.to_string(),
            timestamp: Utc::now(),
        };
        self.broadcast(&message).await
    }

    /// Deliver to every dashboard, pruning the ones that fail
    async fn broadcast(&self, message: &ServerMessage) -> usize {
        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode dashboard message: {}", e);
                return 0;
            }
        };

        let dashboards = self.dashboards.read().await.clone();
        let mut delivered = 0;
        let mut dead = Vec::new();
        for dashboard in &dashboards {
            match dashboard.send_text(text.clone()) {
                Delivery::Sent => delivered += 1,
                Delivery::Failed(id) => dead.push(id),
                Delivery::NoRecipient => {}
            }
        }

        if !dead.is_empty() {
            warn!(count = dead.len(), "Pruning unreachable dashboards");
            self.dashboards
                .write()
                .await
                .retain(|d| !dead.contains(&d.id()));
        }

        debug!(delivered, "Dashboard broadcast");
        delivered
    }
}
