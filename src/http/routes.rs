use super::handlers;
use super::state::AppState;
use super::ws;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Recordings are whole streams; the default 2 MB body limit is far too small
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        // Health check and service info
        .route("/", get(handlers::service_info))
        .route("/health", get(handlers::health_check))
        // Signaling
        .route("/ws/broadcast/:stream_id", get(ws::broadcast_ws))
        .route("/ws/view/:stream_id", get(ws::view_ws))
        .route("/ws/dashboard", get(ws::dashboard_ws))
        // Session listings
        .route("/streams", get(handlers::list_streams))
        .route("/past-streams", get(handlers::list_past_streams))
        .route(
            "/past-streams/:stream_id",
            get(handlers::get_past_stream).delete(handlers::delete_past_stream),
        )
        // Collaborators
        .route(
            "/upload-recording",
            post(handlers::upload_recording).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/analyze-frame", post(handlers::analyze_frame));

    // Stored recordings as static files
    if let Some(mount) = &state.recordings {
        router = router.nest_service(&mount.url_prefix, ServeDir::new(&mount.dir));
    }

    router
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
