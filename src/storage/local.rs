use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;
use uuid::Uuid;

use super::{MediaStorage, RecordingUpload, StoredRecording};

/// Stores recordings as files in a local directory
///
/// Files are named `{stream_id}_{8 hex}.webm` and served under `url_prefix`.
#[derive(Debug, Clone)]
pub struct LocalMediaStorage {
    root: PathBuf,
    url_prefix: String,
}

impl LocalMediaStorage {
    /// Create the storage, making `root` if it does not exist
    pub async fn new(root: impl Into<PathBuf>, url_prefix: &str) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("Failed to create recordings directory {:?}", root))?;

        Ok(Self {
            root,
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    fn filename_for(stream_id: &str) -> String {
        let safe: String = stream_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}_{}.webm", safe, &suffix[..8])
    }
}

#[async_trait::async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn store(&self, upload: RecordingUpload) -> Result<StoredRecording> {
        let filename = Self::filename_for(&upload.stream_id);
        let path = self.root.join(&filename);

        tokio::fs::write(&path, &upload.bytes)
            .await
            .with_context(|| format!("Failed to write recording {:?}", path))?;

        info!(
            stream_id = %upload.stream_id,
            bytes = upload.bytes.len(),
            "Stored recording {}",
            filename
        );

        Ok(StoredRecording {
            url: format!("{}/{}", self.url_prefix, filename),
            filename,
        })
    }

    async fn delete(&self, filename: &str) -> Result<bool> {
        // Only plain file names inside the root
        if filename.is_empty() || filename.contains(['/', '\\']) || filename.starts_with('.') {
            return Ok(false);
        }

        let path = self.root.join(filename);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted recording {}", filename);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to delete recording {:?}", path)),
        }
    }
}
