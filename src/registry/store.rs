use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::{debug, info};

use super::session::{Location, PastSession, Session};
use crate::error::RelayError;
use crate::relay::{PeerHandle, PeerId};

struct SessionEntry {
    session: Session,
    broadcaster: PeerHandle,
    viewers: Vec<PeerHandle>,
}

#[derive(Default)]
struct Tables {
    active: HashMap<String, SessionEntry>,
    past: HashMap<String, PastSession>,
}

/// Everything `remove_session` took out of the registry
#[derive(Debug)]
pub struct RemovedSession {
    pub session: Session,
    pub broadcaster: PeerHandle,
    pub viewers: Vec<PeerHandle>,
}

/// Authoritative table of active sessions, their participants, and past
/// (recorded) sessions
///
/// A single lock guards all tables, so every mutation is serialized against
/// every other and reads never observe a half-updated session.
#[derive(Default)]
pub struct SessionRegistry {
    tables: RwLock<Tables>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session owned by `broadcaster`
    ///
    /// An id that is already active is rejected; the live session and its
    /// viewers are left untouched.
    pub async fn create_session(
        &self,
        id: &str,
        location: Location,
        notes: &str,
        broadcaster: PeerHandle,
    ) -> Result<Session, RelayError> {
        let mut tables = self.tables.write().await;
        if tables.active.contains_key(id) {
            return Err(RelayError::AlreadyExists(id.to_string()));
        }

        let session = Session::new(id, location, notes);
        info!(stream_id = %id, broadcaster = %broadcaster.id(), "Session created");
        tables.active.insert(
            id.to_string(),
            SessionEntry {
                session: session.clone(),
                broadcaster,
                viewers: Vec::new(),
            },
        );
        Ok(session)
    }

    /// Returns false (and changes nothing) if `id` is not active
    pub async fn update_location(&self, id: &str, location: Location) -> bool {
        let mut tables = self.tables.write().await;
        match tables.active.get_mut(id) {
            Some(entry) => {
                entry.session.latitude = location.latitude;
                entry.session.longitude = location.longitude;
                true
            }
            None => false,
        }
    }

    /// Remove the session `id` if `owner` is still its broadcaster
    ///
    /// Idempotent: an absent id, or one now owned by another connection,
    /// returns `None` and changes nothing.
    pub async fn remove_session(&self, id: &str, owner: PeerId) -> Option<RemovedSession> {
        let mut tables = self.tables.write().await;
        if tables.active.get(id)?.broadcaster.id() != owner {
            debug!(stream_id = %id, peer = %owner, "Not the owner, session kept");
            return None;
        }
        let entry = tables.active.remove(id)?;
        info!(stream_id = %id, viewers = entry.viewers.len(), "Session removed");
        Some(RemovedSession {
            session: entry.session,
            broadcaster: entry.broadcaster,
            viewers: entry.viewers,
        })
    }

    /// Remove every active session (server shutdown)
    pub async fn drain(&self) -> Vec<RemovedSession> {
        let mut tables = self.tables.write().await;
        tables
            .active
            .drain()
            .map(|(_, entry)| RemovedSession {
                session: entry.session,
                broadcaster: entry.broadcaster,
                viewers: entry.viewers,
            })
            .collect()
    }

    /// Returns false if the session is absent; the caller must reject the viewer
    pub async fn attach_viewer(&self, id: &str, viewer: PeerHandle) -> bool {
        let mut tables = self.tables.write().await;
        let Some(entry) = tables.active.get_mut(id) else {
            return false;
        };
        if !entry.viewers.iter().any(|v| v.id() == viewer.id()) {
            debug!(stream_id = %id, viewer = %viewer.id(), "Viewer attached");
            entry.viewers.push(viewer);
        }
        true
    }

    /// No-op if the session or the viewer within it is absent
    pub async fn detach_viewer(&self, id: &str, viewer: PeerId) -> bool {
        let mut tables = self.tables.write().await;
        let Some(entry) = tables.active.get_mut(id) else {
            return false;
        };
        let before = entry.viewers.len();
        entry.viewers.retain(|v| v.id() != viewer);
        let removed = entry.viewers.len() != before;
        if removed {
            debug!(stream_id = %id, viewer = %viewer, "Viewer detached");
        }
        removed
    }

    pub async fn get_session(&self, id: &str) -> Option<Session> {
        let tables = self.tables.read().await;
        tables.active.get(id).map(|e| e.session.clone())
    }

    pub async fn get_broadcaster(&self, id: &str) -> Option<PeerHandle> {
        let tables = self.tables.read().await;
        tables.active.get(id).map(|e| e.broadcaster.clone())
    }

    /// True if `owner` is the broadcaster of the active session `id`
    pub async fn is_owner(&self, id: &str, owner: PeerId) -> bool {
        let tables = self.tables.read().await;
        tables
            .active
            .get(id)
            .is_some_and(|e| e.broadcaster.id() == owner)
    }

    /// Broadcaster of `id`, only while `viewer` is attached to it
    pub async fn broadcaster_for(&self, id: &str, viewer: PeerId) -> Option<PeerHandle> {
        let tables = self.tables.read().await;
        let entry = tables.active.get(id)?;
        entry
            .viewers
            .iter()
            .any(|v| v.id() == viewer)
            .then(|| entry.broadcaster.clone())
    }

    pub async fn get_viewers(&self, id: &str) -> Option<Vec<PeerHandle>> {
        let tables = self.tables.read().await;
        tables.active.get(id).map(|e| e.viewers.clone())
    }

    pub async fn active_count(&self) -> usize {
        self.tables.read().await.active.len()
    }

    pub async fn list_active(&self) -> Vec<Session> {
        let tables = self.tables.read().await;
        sorted_active(&tables)
    }

    pub async fn list_past(&self) -> Vec<PastSession> {
        let tables = self.tables.read().await;
        sorted_past(&tables)
    }

    /// Active and past sessions read under one lock
    pub async fn snapshot(&self) -> (Vec<Session>, Vec<PastSession>) {
        let tables = self.tables.read().await;
        (sorted_active(&tables), sorted_past(&tables))
    }

    /// Store a past session, returning the record it replaced
    pub async fn record_past(&self, past: PastSession) -> Option<PastSession> {
        let mut tables = self.tables.write().await;
        info!(stream_id = %past.id, file = %past.video_filename, "Past session recorded");
        tables.past.insert(past.id.clone(), past)
    }

    pub async fn remove_past(&self, id: &str) -> Option<PastSession> {
        self.tables.write().await.past.remove(id)
    }

    pub async fn get_past(&self, id: &str) -> Option<PastSession> {
        self.tables.read().await.past.get(id).cloned()
    }
}

fn sorted_active(tables: &Tables) -> Vec<Session> {
    let mut sessions: Vec<Session> = tables.active.values().map(|e| e.session.clone()).collect();
    sessions.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
    sessions
}

fn sorted_past(tables: &Tables) -> Vec<PastSession> {
    let mut past: Vec<PastSession> = tables.past.values().cloned().collect();
    past.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
    past
}
