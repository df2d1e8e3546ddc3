//! Signaling wire protocol
//!
//! UTF-8 text frames carrying a JSON object tagged by `type`. Session
//! description and candidate payloads are opaque to the relay.

pub mod messages;

pub use messages::{decode, BroadcasterMessage, ServerMessage, ViewerMessage};
