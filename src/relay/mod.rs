//! Signaling relay core
//!
//! - [`Relay`] owns the registry, router and dashboard notifier
//! - [`handlers`] run the per-connection state machines
//! - [`PeerHandle`] is a connection's outbound queue; every send is best-effort

pub mod handlers;
mod notifier;
mod peer;
mod router;

pub use handlers::{BroadcasterConnection, CloseReason, DashboardConnection, ViewerConnection};
pub use notifier::DashboardNotifier;
pub use peer::{Delivery, PeerHandle, PeerId};
pub use router::{FanOut, MessageRouter};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::config::RelayConfig;
use crate::protocol::ServerMessage;
use crate::registry::SessionRegistry;

/// The relay's shared state
///
/// Built once at server start and handed to every connection by `Arc`.
pub struct Relay {
    config: RelayConfig,
    registry: Arc<SessionRegistry>,
    router: MessageRouter,
    notifier: DashboardNotifier,
    next_peer: AtomicU64,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        Self {
            config,
            router: MessageRouter::new(Arc::clone(&registry)),
            notifier: DashboardNotifier::new(Arc::clone(&registry)),
            registry,
            next_peer: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    pub fn notifier(&self) -> &DashboardNotifier {
        &self.notifier
    }

    /// Allocate an id and outbound queue for a newly accepted connection
    pub fn connect(&self) -> (PeerHandle, mpsc::Receiver<String>) {
        let id = PeerId::from(self.next_peer.fetch_add(1, Ordering::Relaxed));
        PeerHandle::channel(id, self.config.outbound_queue)
    }

    /// End every active session: viewers get `stream_ended`, dashboards get
    /// a final snapshot. Returns the number of sessions ended.
    pub async fn shutdown(&self) -> usize {
        let drained = self.registry.drain().await;
        let count = drained.len();

        for removed in drained {
            let ended = ServerMessage::StreamEnded {
                stream_id: removed.session.id.clone(),
            };
            for viewer in &removed.viewers {
                viewer.send(&ended);
            }
        }

        self.notifier.broadcast_list().await;
        info!(sessions = count, "Relay shut down");
        count
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(RelayConfig::default())
    }
}
