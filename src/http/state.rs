use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::SentryConfig;
use crate::relay::Relay;
use crate::sentry::{FrameClassifier, ThreatLabels};
use crate::storage::MediaStorage;

/// Directory served as static files under `url_prefix`
#[derive(Debug, Clone)]
pub struct RecordingsMount {
    pub url_prefix: String,
    pub dir: PathBuf,
}

/// Shared application state for HTTP and WebSocket handlers
#[derive(Clone)]
pub struct AppState {
    pub service_name: String,

    /// Registry, router and notifier
    pub relay: Arc<Relay>,

    /// Where uploaded recordings go
    pub storage: Arc<dyn MediaStorage>,

    /// Frame analysis; `None` makes `/analyze-frame` unavailable
    pub classifier: Option<Arc<dyn FrameClassifier>>,

    pub labels: Arc<ThreatLabels>,

    /// WebSocket ping period
    pub heartbeat: Option<Duration>,

    pub recordings: Option<RecordingsMount>,
}

impl AppState {
    pub fn new(relay: Arc<Relay>, storage: Arc<dyn MediaStorage>) -> Self {
        let heartbeat = relay.config().heartbeat();
        Self {
            service_name: "beacon-relay".to_string(),
            relay,
            storage,
            classifier: None,
            labels: Arc::new(ThreatLabels::new(SentryConfig::default().labels)),
            heartbeat,
            recordings: None,
        }
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn FrameClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_labels(mut self, labels: ThreatLabels) -> Self {
        self.labels = Arc::new(labels);
        self
    }

    pub fn with_recordings(mut self, url_prefix: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.recordings = Some(RecordingsMount {
            url_prefix: url_prefix.into(),
            dir: dir.into(),
        });
        self
    }
}
