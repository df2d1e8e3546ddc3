use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RelayError;
use crate::registry::{PastSession, Session};
use crate::relay::PeerId;

// ============================================================================
// Inbound
// ============================================================================

/// Frames accepted on `/ws/broadcast/:stream_id`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BroadcasterMessage {
    StartStream {
        #[serde(default)]
        latitude: f64,
        #[serde(default)]
        longitude: f64,
        #[serde(default)]
        notes: String,
    },
    UpdateLocation {
        #[serde(default)]
        latitude: f64,
        #[serde(default)]
        longitude: f64,
    },
    /// `viewer_id` is accepted but offers always fan out to every viewer
    Offer {
        sdp: Value,
        #[serde(default)]
        viewer_id: Option<Value>,
    },
    IceCandidate {
        candidate: Value,
    },
    StopStream,
    #[serde(other)]
    Unknown,
}

/// Frames accepted on `/ws/view/:stream_id`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewerMessage {
    Answer { sdp: Value },
    IceCandidate { candidate: Value },
    #[serde(other)]
    Unknown,
}

// ============================================================================
// Outbound
// ============================================================================

/// Every frame the relay sends, to any role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Broadcaster: reply to `start_stream`
    StreamStarted { stream_id: String },

    /// Broadcaster: a viewer attached and wants an offer
    ViewerJoined { viewer_id: PeerId },

    /// Viewer: offer forwarded from the broadcaster
    Offer { sdp: Value, stream_id: String },

    /// Broadcaster: answer forwarded from a viewer
    Answer { sdp: Value, viewer_id: PeerId },

    /// Either direction. Tagged with `stream_id` towards viewers and
    /// `viewer_id` towards the broadcaster.
    IceCandidate {
        candidate: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stream_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        viewer_id: Option<PeerId>,
    },

    /// Viewer: the broadcaster went away
    StreamEnded { stream_id: String },

    Error { message: String },

    /// Dashboard: full registry snapshot
    StreamList {
        streams: Vec<Session>,
        past_streams: Vec<PastSession>,
    },

    /// Dashboard: frame classifier detection
    Alert {
        stream_id: String,
        latitude: f64,
        longitude: f64,
        threat_type: String,
        timestamp: DateTime<Utc>,
    },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Encode as a JSON text frame
    pub fn to_json(&self) -> Result<String, RelayError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Decode one inbound text frame
///
/// Unrecognized `type`s decode to the `Unknown` variant. Anything that is not
/// a JSON object with a `type`, or a known type with bad fields, is malformed.
pub fn decode<T: DeserializeOwned>(frame: &str) -> Result<T, RelayError> {
    Ok(serde_json::from_str(frame)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_stream_defaults() {
        let msg: BroadcasterMessage = decode(r#"{"type":"start_stream"}"#).unwrap();
        assert_eq!(
            msg,
            BroadcasterMessage::StartStream {
                latitude: 0.0,
                longitude: 0.0,
                notes: String::new(),
            }
        );
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        let msg: BroadcasterMessage = decode(r#"{"type":"ping","foo":1}"#).unwrap();
        assert_eq!(msg, BroadcasterMessage::Unknown);

        let msg: ViewerMessage = decode(r#"{"type":"offer","sdp":"x"}"#).unwrap();
        assert_eq!(msg, ViewerMessage::Unknown);
    }

    #[test]
    fn test_malformed_frames() {
        assert!(decode::<BroadcasterMessage>("not json").is_err());
        assert!(decode::<BroadcasterMessage>(r#"{"sdp":"x"}"#).is_err());
        // Known type missing its payload
        assert!(matches!(
            decode::<ViewerMessage>(r#"{"type":"answer"}"#),
            Err(RelayError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_offer_payload_is_opaque() {
        let msg: BroadcasterMessage = decode(
            r#"{"type":"offer","sdp":{"type":"offer","sdp":"v=0"},"viewer_id":140234}"#,
        )
        .unwrap();
        match msg {
            BroadcasterMessage::Offer { sdp, viewer_id } => {
                assert_eq!(sdp, json!({"type": "offer", "sdp": "v=0"}));
                assert_eq!(viewer_id, Some(json!(140234)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_ice_candidate_tagging() {
        let to_viewer = ServerMessage::IceCandidate {
            candidate: json!("c"),
            stream_id: Some("s1".to_string()),
            viewer_id: None,
        };
        let value: Value = serde_json::from_str(&to_viewer.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "ice_candidate", "candidate": "c", "stream_id": "s1"})
        );

        let to_broadcaster = ServerMessage::IceCandidate {
            candidate: json!("c"),
            stream_id: None,
            viewer_id: Some(PeerId::from(7)),
        };
        let value: Value = serde_json::from_str(&to_broadcaster.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "ice_candidate", "candidate": "c", "viewer_id": 7})
        );
    }
}
