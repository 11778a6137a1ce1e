//! REST/SSE API for the MedScan station
//!
//! Exposes the diagnostic session, the model catalog, the comment store,
//! and the live event stream.

pub mod handlers;
pub mod sse;

use crate::state::AppState;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use medscan_common::Error;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn build_router(state: AppState) -> Router {
    // Headroom over the upload ceiling so multipart framing does not trip
    // the body limit before intake can report the canonical error
    let body_limit = state.config.upload.max_bytes + 1024 * 1024;

    Router::new()
        // Health check (no prefix for health endpoint)
        .route("/health", get(health_check))

        // Stored attachments
        .route("/objects/:key", get(handlers::get_object))

        // API v1 routes
        .nest("/api/v1", Router::new()
            // Model catalog
            .route("/models", get(handlers::get_models))
            .route("/models/:key", get(handlers::get_model))

            // Diagnostic session
            .route("/session", get(handlers::get_session))
            .route("/session/image", post(handlers::upload_image))
            .route("/session/model", post(handlers::select_model))
            .route("/session/analyze", post(handlers::analyze))
            .route("/session/feedback", post(handlers::give_feedback))
            .route("/session/submit", post(handlers::submit_training_record))
            .route("/session/reset", post(handlers::reset_session))

            // Training comments
            .route("/comments", get(handlers::list_comments))
            .route("/comments", post(handlers::post_comment))

            // SSE events
            .route("/events", get(sse::event_stream))
        )
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "medscan-station",
        "version": env!("CARGO_PKG_VERSION"),
        "port": state.config.port,
        "models": state.catalog.models().len(),
    }))
}

/// Error wrapper mapping the common taxonomy onto HTTP statuses
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidInput(_) | Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidState(_) => StatusCode::CONFLICT,
            Error::Network(_) | Error::Backend(_) => StatusCode::BAD_GATEWAY,
            Error::Database(_)
            | Error::Io(_)
            | Error::Config(_)
            | Error::Storage(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
