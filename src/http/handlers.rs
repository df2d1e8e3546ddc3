use std::collections::HashMap;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::{error, info, warn};

use super::state::AppState;
use crate::registry::{Location, PastSession, Session};
use crate::storage::RecordingUpload;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub status: String,
    pub service: String,
    pub active_streams: usize,
    pub dashboards: usize,
    /// Name of the configured frame classifier, if any
    pub classifier: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StreamsResponse {
    pub streams: Vec<Session>,
}

#[derive(Debug, Serialize)]
pub struct PastStreamsResponse {
    pub past_streams: Vec<PastSession>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub stream: PastSession,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeFrameResponse {
    pub success: bool,
    pub threat_detected: bool,
    pub detection_types: Vec<String>,
    /// Labels returned by the classifier, comma-separated, or `NONE`
    pub analysis: String,
    pub stream_id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

// ============================================================================
// Multipart forms
// ============================================================================

struct UploadedFile {
    bytes: Vec<u8>,
    content_type: Option<String>,
}

/// Text fields and file parts of a multipart body, by field name
#[derive(Default)]
struct Form {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl Form {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Form::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid form: {}", e)))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if field.file_name().is_some() {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| {
                    api_error(StatusCode::BAD_REQUEST, format!("Invalid file {}: {}", name, e))
                })?;
                form.files.insert(
                    name,
                    UploadedFile {
                        bytes: bytes.to_vec(),
                        content_type,
                    },
                );
            } else {
                let text = field.text().await.map_err(|e| {
                    api_error(StatusCode::BAD_REQUEST, format!("Invalid field {}: {}", name, e))
                })?;
                form.fields.insert(name, text);
            }
        }

        Ok(form)
    }

    fn text(&self, name: &str) -> Result<String, ApiError> {
        self.fields
            .get(name)
            .cloned()
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, format!("Missing field: {}", name)))
    }

    fn number(&self, name: &str) -> Result<f64, ApiError> {
        self.text(name)?.trim().parse().map_err(|_| {
            api_error(StatusCode::BAD_REQUEST, format!("Field {} must be a number", name))
        })
    }

    fn number_or(&self, name: &str, default: f64) -> Result<f64, ApiError> {
        if self.fields.contains_key(name) {
            self.number(name)
        } else {
            Ok(default)
        }
    }

    fn file(&mut self, name: &str) -> Result<UploadedFile, ApiError> {
        self.files
            .remove(name)
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, format!("Missing file: {}", name)))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /
/// Service information
pub async fn service_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(ServiceInfo {
        status: "ok".to_string(),
        service: state.service_name.clone(),
        active_streams: state.relay.registry().active_count().await,
        dashboards: state.relay.notifier().len().await,
        classifier: state.classifier.as_ref().map(|c| c.name().to_string()),
    })
}

/// GET /streams
/// Active sessions
pub async fn list_streams(State(state): State<AppState>) -> impl IntoResponse {
    Json(StreamsResponse {
        streams: state.relay.registry().list_active().await,
    })
}

/// GET /past-streams
/// Sessions with an uploaded recording
pub async fn list_past_streams(State(state): State<AppState>) -> impl IntoResponse {
    Json(PastStreamsResponse {
        past_streams: state.relay.registry().list_past().await,
    })
}

/// GET /past-streams/:stream_id
pub async fn get_past_stream(
    State(state): State<AppState>,
    Path(stream_id): Path<String>,
) -> Result<Json<PastSession>, ApiError> {
    state
        .relay
        .registry()
        .get_past(&stream_id)
        .await
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Stream not found"))
}

/// DELETE /past-streams/:stream_id
/// Remove a past session and its recording
pub async fn delete_past_stream(
    State(state): State<AppState>,
    Path(stream_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let past = state
        .relay
        .registry()
        .remove_past(&stream_id)
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Stream not found"))?;

    info!("Deleting past stream: {}", stream_id);

    if let Err(e) = state.storage.delete(&past.video_filename).await {
        error!("Failed to delete recording {}: {}", past.video_filename, e);
    }

    state.relay.notifier().broadcast_list().await;

    Ok(Json(DeleteResponse { success: true }))
}

/// POST /upload-recording
/// Store a finished stream's recording and list it as a past session
pub async fn upload_recording(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut form = Form::read(multipart).await?;

    let stream_id = form.text("stream_id")?;
    let started_at = form.text("started_at")?;
    let ended_at = form.text("ended_at")?;
    let latitude = form.number("latitude")?;
    let longitude = form.number("longitude")?;
    let duration_seconds = form.number("duration_seconds")?;
    let notes = form.fields.get("notes").cloned().unwrap_or_default();
    let video = form.file("video")?;

    info!(stream_id = %stream_id, bytes = video.bytes.len(), "Uploading recording");

    let stored = state
        .storage
        .store(RecordingUpload {
            stream_id: stream_id.clone(),
            bytes: video.bytes,
        })
        .await
        .map_err(|e| {
            error!("Failed to store recording for {}: {}", stream_id, e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to store recording: {}", e),
            )
        })?;

    let past = PastSession {
        id: stream_id,
        started_at,
        ended_at,
        latitude,
        longitude,
        notes,
        duration_seconds,
        video_filename: stored.filename,
        video_url: stored.url,
    };

    if let Some(replaced) = state.relay.registry().record_past(past.clone()).await {
        if replaced.video_filename != past.video_filename {
            if let Err(e) = state.storage.delete(&replaced.video_filename).await {
                warn!("Failed to delete replaced recording {}: {}", replaced.video_filename, e);
            }
        }
    }

    state.relay.notifier().broadcast_list().await;

    Ok(Json(UploadResponse {
        success: true,
        stream: past,
    }))
}

/// POST /analyze-frame
/// Run a frame through the classifier; alert dashboards on a detection
pub async fn analyze_frame(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalyzeFrameResponse>, ApiError> {
    let Some(classifier) = state.classifier.clone() else {
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "No frame classifier configured",
        ));
    };

    let mut form = Form::read(multipart).await?;
    let stream_id = form.text("stream_id")?;
    let location = Location::new(form.number_or("latitude", 0.0)?, form.number_or("longitude", 0.0)?);
    let frame = form.file("frame")?;
    let mime_type = frame.content_type.as_deref().unwrap_or("image/jpeg");

    info!(
        stream_id = %stream_id,
        bytes = frame.bytes.len(),
        classifier = classifier.name(),
        "Analyzing frame"
    );

    let labels = classifier
        .classify(&frame.bytes, mime_type)
        .await
        .map_err(|e| {
            error!("Frame analysis failed for {}: {}", stream_id, e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Analysis failed: {}", e),
            )
        })?;

    let detection = state.labels.evaluate(&labels);
    if let Some(reason) = &detection.reason {
        state
            .relay
            .notifier()
            .broadcast_alert(&stream_id, location, reason)
            .await;
    }

    let mut analysis: Vec<String> = labels.into_iter().collect();
    analysis.sort();

    Ok(Json(AnalyzeFrameResponse {
        success: true,
        threat_detected: detection.is_threat(),
        detection_types: detection.detection_types,
        analysis: if analysis.is_empty() {
            "NONE".to_string()
        } else {
            analysis.join(",")
        },
        stream_id,
    }))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
