//! Media storage collaborator
//!
//! Recordings of finished streams are uploaded over HTTP and handed to a
//! [`MediaStorage`]; the registry only keeps the returned retrieval handle.

mod local;

pub use local::LocalMediaStorage;

use anyhow::Result;

/// A finished recording to store
#[derive(Debug, Clone)]
pub struct RecordingUpload {
    pub stream_id: String,
    pub bytes: Vec<u8>,
}

/// Retrieval handle for a stored recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecording {
    pub filename: String,
    pub url: String,
}

#[async_trait::async_trait]
pub trait MediaStorage: Send + Sync {
    async fn store(&self, upload: RecordingUpload) -> Result<StoredRecording>;

    /// Returns false if nothing was stored under `filename`
    async fn delete(&self, filename: &str) -> Result<bool>;
}
