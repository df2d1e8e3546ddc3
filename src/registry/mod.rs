//! Session registry
//!
//! In-memory table mapping stream ids to:
//! - the session record (location, notes, start time)
//! - the owning broadcaster connection
//! - the attached viewer connections
//!
//! plus the list of past sessions whose recordings were uploaded.

mod session;
mod store;

pub use session::{Location, PastSession, Session};
pub use store::{RemovedSession, SessionRegistry};
