use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A (latitude, longitude) pair reported by a broadcaster
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// One active broadcaster-initiated stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Supplied by the broadcaster's endpoint path, unique among active sessions
    pub id: String,

    /// When `start_stream` was received
    pub started_at: DateTime<Utc>,

    /// Last reported position
    pub latitude: f64,
    pub longitude: f64,

    /// Free-form notes from `start_stream`
    pub notes: String,

    /// Always true; ended sessions are removed from the registry
    pub is_active: bool,
}

impl Session {
    pub fn new(id: impl Into<String>, location: Location, notes: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            started_at: Utc::now(),
            latitude: location.latitude,
            longitude: location.longitude,
            notes: notes.into(),
            is_active: true,
        }
    }

    pub fn location(&self) -> Location {
        Location::new(self.latitude, self.longitude)
    }
}

/// A finished stream whose recording was uploaded to media storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PastSession {
    pub id: String,

    /// Timestamps as reported by the uploader
    pub started_at: String,
    pub ended_at: String,

    pub latitude: f64,
    pub longitude: f64,
    pub notes: String,
    pub duration_seconds: f64,

    /// Retrieval handle returned by media storage
    pub video_filename: String,
    pub video_url: String,
}
