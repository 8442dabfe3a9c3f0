pub mod handlers;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::Config;
use crate::pipeline::TranscriptionPipeline;
use crate::store::TranscriptStore;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TranscriptionPipeline>,
    pub store: Arc<dyn TranscriptStore>,
    pub config: Arc<Config>,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // slack on top of the upload cap for multipart framing overhead
    let body_limit = state.config.limits.max_upload_bytes as usize + 1024 * 1024;

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/api/transcriptions", post(handlers::upload_handler))
        .route("/api/transcriptions/{id}", get(handlers::fetch_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
