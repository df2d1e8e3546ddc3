pub mod config;
pub mod error;
pub mod http;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod sentry;
pub mod storage;

pub use config::Config;
pub use error::RelayError;
pub use http::{create_router, AppState};
pub use protocol::{BroadcasterMessage, ServerMessage, ViewerMessage};
pub use registry::{Location, PastSession, Session, SessionRegistry};
pub use relay::{
    BroadcasterConnection, CloseReason, DashboardConnection, Delivery, PeerHandle, PeerId, Relay,
    ViewerConnection,
};
pub use sentry::{Detection, FrameClassifier, LabelRule, ThreatLabels, VisionClassifier};
pub use storage::{LocalMediaStorage, MediaStorage, RecordingUpload, StoredRecording};
