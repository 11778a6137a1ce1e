//! HTTP request handlers
//!
//! Implements the station REST endpoints: catalog, session workflow,
//! comment submission/listing, and stored-object serving.

use crate::api::ApiError;
use crate::intake::RawUpload;
use crate::session::{AnalysisResult, AnalyzeDisposition, SessionSnapshot, SubmissionForm};
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use medscan_common::catalog::ModelDescriptor;
use medscan_common::events::FeedbackVerdict;
use medscan_common::records::{Attachment, FeedbackRecord, NewComment};
use medscan_common::Error;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    models: Vec<ModelDescriptor>,
}

#[derive(Debug, Deserialize)]
pub struct SelectModelRequest {
    model: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<AnalysisResult>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    verdict: FeedbackVerdict,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    name: String,
    email: String,
    comment: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    record: CommentView,
}

#[derive(Debug, Serialize)]
pub struct CommentsResponse {
    comments: Vec<CommentView>,
}

/// A stored record with its attachment key resolved to a public URL
#[derive(Debug, Serialize)]
pub struct CommentView {
    id: Uuid,
    name: String,
    email: String,
    comment: String,
    picture_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl CommentView {
    fn from_record(record: FeedbackRecord, state: &AppState) -> Self {
        let picture_url = record
            .picture_url
            .as_deref()
            .map(|key| state.store.attachment_url(key));
        Self {
            id: record.id,
            name: record.name,
            email: record.email,
            comment: record.comment,
            picture_url,
            created_at: record.created_at,
        }
    }
}

// ============================================================================
// Model Catalog
// ============================================================================

/// GET /api/v1/models - All models in catalog order
pub async fn get_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.catalog.models().to_vec(),
    })
}

/// GET /api/v1/models/:key - One model descriptor
pub async fn get_model(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ModelDescriptor>, ApiError> {
    let model = state
        .catalog
        .get(&key)
        .ok_or_else(|| Error::NotFound(format!("unknown model: {key}")))?;
    Ok(Json(model.clone()))
}

// ============================================================================
// Diagnostic Session
// ============================================================================

/// GET /api/v1/session - Current session snapshot
pub async fn get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot().await)
}

/// POST /api/v1/session/image - Multipart image upload
///
/// Validation failures leave the current session image untouched.
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let upload = read_file_field(multipart, "file")
        .await?
        .ok_or_else(|| Error::InvalidInput("multipart field 'file' is required".to_string()))?;

    let image = state.intake.accept(upload)?;
    Ok(Json(state.session.load_image(image).await))
}

/// POST /api/v1/session/model - Select the active model
pub async fn select_model(
    State(state): State<AppState>,
    Json(request): Json<SelectModelRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.session.select_model(&request.model).await?))
}

/// POST /api/v1/session/analyze - Run one analysis against the backend
///
/// A trigger while an analysis is in flight is acknowledged without
/// issuing a second request; a superseded completion is not an error.
pub async fn analyze(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<AnalyzeResponse>), ApiError> {
    match state.session.run_analysis(&state.inference).await? {
        AnalyzeDisposition::Completed(result) => Ok((
            StatusCode::OK,
            Json(AnalyzeResponse {
                status: "complete",
                result: Some(result),
            }),
        )),
        AnalyzeDisposition::AlreadyRunning => Ok((
            StatusCode::ACCEPTED,
            Json(AnalyzeResponse {
                status: "analyzing",
                result: None,
            }),
        )),
        AnalyzeDisposition::Superseded => Ok((
            StatusCode::OK,
            Json(AnalyzeResponse {
                status: "superseded",
                result: None,
            }),
        )),
    }
}

/// POST /api/v1/session/feedback - Rate the current prediction
pub async fn give_feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.session.give_feedback(request.verdict).await?))
}

/// POST /api/v1/session/submit - Persist the case as a training record
///
/// Only reachable from the incorrect-feedback branch; the session image
/// becomes the record's attachment.
pub async fn submit_training_record(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let form = SubmissionForm {
        name: request.name,
        email: request.email,
        comment: request.comment,
    };
    let (draft, epoch) = state.session.compose_submission(form).await?;
    let record = state.store.submit(draft).await?;
    state.session.confirm_submission(epoch).await;

    info!(id = %record.id, "training record submitted");
    Ok(Json(SubmitResponse {
        record: CommentView::from_record(record, &state),
    }))
}

/// POST /api/v1/session/reset - Clear the session back to Idle
pub async fn reset_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.reset().await)
}

// ============================================================================
// Training Comments
// ============================================================================

/// GET /api/v1/comments - All records, newest first
pub async fn list_comments(
    State(state): State<AppState>,
) -> Result<Json<CommentsResponse>, ApiError> {
    let comments = state
        .store
        .list()
        .await?
        .into_iter()
        .map(|record| CommentView::from_record(record, &state))
        .collect();
    Ok(Json(CommentsResponse { comments }))
}

/// POST /api/v1/comments - Direct multipart comment submission
///
/// Fields: name, email, comment (required); picture (optional image file,
/// validated with the same rules as a session upload).
pub async fn post_comment(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SubmitResponse>, ApiError> {
    let mut name = String::new();
    let mut email = String::new();
    let mut comment = String::new();
    let mut attachment = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidInput(format!("malformed multipart body: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => name = read_text(field).await?,
            "email" => email = read_text(field).await?,
            "comment" => comment = read_text(field).await?,
            "picture" => {
                let upload = read_file(field).await?;
                state.intake.validate(&upload)?;
                attachment = Some(Attachment {
                    file_name: upload.file_name,
                    content_type: upload.content_type,
                    bytes: upload.bytes,
                });
            }
            _ => {} // unknown fields are ignored
        }
    }

    let record = state
        .store
        .submit(NewComment {
            name,
            email,
            comment,
            attachment,
        })
        .await?;

    Ok(Json(SubmitResponse {
        record: CommentView::from_record(record, &state),
    }))
}

// ============================================================================
// Stored Objects
// ============================================================================

/// GET /objects/:key - Serve a stored attachment
pub async fn get_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (bytes, content_type) = state.store.objects().read(&key).await?;
    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}

// ============================================================================
// Multipart helpers
// ============================================================================

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError(Error::InvalidInput(format!("unreadable form field: {e}"))))
}

async fn read_file(field: axum::extract::multipart::Field<'_>) -> Result<RawUpload, ApiError> {
    let file_name = field.file_name().unwrap_or("upload").to_string();
    let content_type = field.content_type().unwrap_or_default().to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|e| ApiError(Error::InvalidInput(format!("unreadable file field: {e}"))))?;
    Ok(RawUpload {
        file_name,
        content_type,
        bytes: bytes.to_vec(),
    })
}

/// Scan a multipart body for the named file field
async fn read_file_field(
    mut multipart: Multipart,
    name: &str,
) -> Result<Option<RawUpload>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidInput(format!("malformed multipart body: {e}")))?
    {
        if field.name() == Some(name) {
            return Ok(Some(read_file(field).await?));
        }
    }
    Ok(None)
}
