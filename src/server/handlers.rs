use std::time::Instant;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::audio::unique_name;
use crate::error::{ApiFailure, ScribeError};
use crate::pipeline::UploadedAudio;
use crate::store::TranscriptionRecord;

use super::AppState;

/// Extensions accepted for upload. Checked before anything touches disk.
const ALLOWED_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "ogg", "flac", "webm", "mp4"];

/// The API reports no confidence score, so records carry a fixed estimate.
const ESTIMATED_CONFIDENCE: f32 = 0.9;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
        }),
    )
}

pub async fn fetch_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get(&id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("transcription {id} not found"),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "store lookup failed");
            internal_error()
        }
    }
}

#[tracing::instrument(skip(state, multipart))]
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Response {
    let field = match multipart.next_field().await {
        Ok(Some(f)) => f,
        Ok(None) => {
            return bad_request("No file uploaded");
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to read multipart body");
            return bad_request("Could not read the uploaded file");
        }
    };

    let filename = field.file_name().unwrap_or("upload").to_string();
    let media_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    // validation happens before any temp file exists and before any
    // external tool runs
    let ext = match extension_of(&filename) {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => ext,
        other => {
            let ext = other.unwrap_or_default();
            tracing::warn!(filename = %filename, "rejected unsupported extension");
            return error_response(&ScribeError::UnsupportedFormat(ext));
        }
    };

    let data = match field.bytes().await {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read upload bytes");
            return bad_request("Could not read the uploaded file");
        }
    };

    let size_bytes = data.len() as u64;
    let limit = state.config.limits.max_upload_bytes;
    if size_bytes > limit {
        return error_response(&ScribeError::UploadTooLarge {
            size: size_bytes,
            limit,
        });
    }
    if size_bytes == 0 {
        return bad_request("Uploaded file is empty");
    }

    if let Err(e) = tokio::fs::create_dir_all(&state.config.temp_dir).await {
        tracing::error!(error = %e, "failed to create temp dir");
        return internal_error();
    }

    let upload_path = state.config.temp_dir.join(unique_name("upload", &ext));
    if let Err(e) = tokio::fs::write(&upload_path, &data).await {
        tracing::error!(error = %e, "failed to write upload to disk");
        // a partial write must not outlive the request
        let _ = tokio::fs::remove_file(&upload_path).await;
        return internal_error();
    }

    tracing::info!(
        filename = %filename,
        bytes = size_bytes,
        "upload accepted, starting transcription"
    );

    let upload = UploadedAudio {
        path: upload_path,
        filename: filename.clone(),
        size_bytes,
        media_type: media_type.clone(),
    };

    let started = Instant::now();
    let output = match state.pipeline.run(&upload).await {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(error = %e, filename = %filename, "transcription failed");
            return error_response(&e);
        }
    };

    let record = TranscriptionRecord {
        id: String::new(),
        filename,
        size_bytes,
        media_type,
        duration_secs: output.duration_secs,
        text: output.text,
        word_count: output.word_count,
        confidence: ESTIMATED_CONFIDENCE,
        processing_secs: started.elapsed().as_secs_f64(),
        created_at: Utc::now(),
        total_chunks: output.total_chunks,
    };

    match state.store.insert(record).await {
        Ok(stored) => {
            tracing::info!(
                id = %stored.id,
                words = stored.word_count,
                chunks = ?stored.total_chunks,
                "transcription stored"
            );
            (StatusCode::OK, Json(stored)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to store transcription");
            internal_error()
        }
    }
}

fn extension_of(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Internal error while processing the file.".to_string(),
        }),
    )
        .into_response()
}

/// Map pipeline errors to HTTP statuses; bodies carry the user-facing
/// message, never the raw error.
fn error_response(err: &ScribeError) -> Response {
    let status = match err {
        ScribeError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ScribeError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        ScribeError::Conversion(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ScribeError::Transcription(api) => match api {
            ApiFailure::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiFailure::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::BAD_GATEWAY,
        },
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            error: err.user_message(),
        }),
    )
        .into_response()
}
