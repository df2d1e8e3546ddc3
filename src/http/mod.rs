//! HTTP + WebSocket server
//!
//! Signaling endpoints:
//! - WS /ws/broadcast/:stream_id - Broadcaster control loop
//! - WS /ws/view/:stream_id - Viewer control loop
//! - WS /ws/dashboard - Dashboard updates and alerts
//!
//! REST endpoints:
//! - GET /, GET /health - Service info, health check
//! - GET /streams, GET /past-streams, GET|DELETE /past-streams/:id
//! - POST /upload-recording - Store a finished stream's recording
//! - POST /analyze-frame - Classify a frame and alert dashboards
//! - GET /recordings/* - Stored recordings

mod handlers;
mod routes;
mod state;
mod ws;

pub use handlers::ErrorResponse;
pub use routes::create_router;
pub use state::{AppState, RecordingsMount};
