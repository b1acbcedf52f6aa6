use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::drafts::handlers::UserIdQuery;
use crate::errors::AppError;
use crate::models::draft::{NewDraft, PipelineLinkage};
use crate::normalizer::mapping::{build_draft, record_from_submission, IntakeContext, UploadSource};
use crate::state::AppState;
use crate::storage::archive_document;

#[derive(Deserialize)]
pub struct JsonIntakeRequest {
    pub user_id: Uuid,
    pub resume: Value,
    pub position_id: Option<i64>,
    pub original_filename: Option<String>,
}

/// Returned whenever a submission has been staged as a draft.
#[derive(Debug, Serialize, Deserialize)]
pub struct IntakeResponse {
    pub draft_id: i64,
    pub upload_source: String,
    pub service_file_id: Option<String>,
    pub storage_url: Option<String>,
    pub work_experiences: usize,
    pub education_experiences: usize,
    pub project_experiences: usize,
    pub linkage: Option<PipelineLinkage>,
}

impl IntakeResponse {
    fn for_draft(draft_id: i64, draft: &NewDraft) -> Self {
        Self {
            draft_id,
            upload_source: draft.provenance.upload_source.clone().unwrap_or_default(),
            service_file_id: draft.provenance.service_file_id.clone(),
            storage_url: draft.provenance.storage_url.clone(),
            work_experiences: draft.record.work_experiences.len(),
            education_experiences: draft.record.education_experiences.len(),
            project_experiences: draft.record.project_experiences.len(),
            linkage: draft.linkage.clone(),
        }
    }
}

/// Resolves company > project > position for an intake. A missing position
/// or a failed lookup stages the draft without linkage.
pub(crate) async fn resolve_position(state: &AppState, position_id: i64) -> Option<PipelineLinkage> {
    match state.pipeline.position_context(position_id).await {
        Ok(Some(linkage)) => {
            info!(
                "Intake linked to {} > {} > {}",
                linkage.company_name.as_deref().unwrap_or("?"),
                linkage.project_name.as_deref().unwrap_or("?"),
                linkage.position_name.as_deref().unwrap_or("?")
            );
            Some(linkage)
        }
        Ok(None) => {
            warn!("Position {position_id} not found; staging draft without linkage");
            None
        }
        Err(e) => {
            warn!("Position {position_id} lookup failed: {e}; staging draft without linkage");
            None
        }
    }
}

/// Saves a staged draft and builds the response.
pub(crate) async fn stage(
    state: &AppState,
    owner: Uuid,
    draft: NewDraft,
) -> Result<IntakeResponse, AppError> {
    let name = draft.record.display_name().to_string();
    let draft_id = state.drafts.save(owner, draft.clone()).await?;
    info!("Staged draft {draft_id} for {name} (owner {owner})");
    Ok(IntakeResponse::for_draft(draft_id, &draft))
}

struct UploadForm {
    filename: String,
    content_type: Option<String>,
    bytes: Bytes,
    position_id: Option<i64>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut file = None;
    let mut position_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("document").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read file: {e}")))?;
                file = Some((filename, content_type, bytes));
            }
            Some("position_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read position_id: {e}")))?;
                let text = text.trim();
                if !text.is_empty() {
                    let id = text.parse::<i64>().map_err(|_| {
                        AppError::Validation(format!("position_id must be an integer, got '{text}'"))
                    })?;
                    position_id = Some(id);
                }
            }
            _ => {}
        }
    }

    let (filename, content_type, bytes) =
        file.ok_or_else(|| AppError::Validation("Multipart field 'file' is required".to_string()))?;
    if bytes.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }

    Ok(UploadForm {
        filename,
        content_type,
        bytes,
        position_id,
    })
}

/// POST /api/v1/intake/upload
///
/// Runs the document through the normalizer and stages the result. The
/// request stays open for the whole upload → poll → extract sequence.
pub async fn handle_upload(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<IntakeResponse>), AppError> {
    let form = read_upload_form(multipart).await?;

    let linkage = match form.position_id {
        Some(id) => resolve_position(&state, id).await,
        None => None,
    };

    let normalized = state
        .normalizer
        .normalize(form.bytes.clone(), &form.filename)
        .await?;

    let archived = match archive_document(
        &state.s3,
        &state.config.s3_bucket,
        &state.config.s3_endpoint,
        &form.filename,
        form.bytes,
        form.content_type.as_deref(),
    )
    .await
    {
        Ok(doc) => Some(doc),
        Err(e) => {
            warn!("Archiving {} failed, continuing without it: {e}", form.filename);
            None
        }
    };

    let mut ctx = IntakeContext::new(UploadSource::WebUpload);
    ctx.original_filename = Some(form.filename);
    ctx.archived = archived;
    ctx.service_file_id = Some(normalized.file_id);
    ctx.linkage = linkage;

    let response = stage(&state, params.user_id, build_draft(normalized.record, ctx)).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/v1/intake/json
pub async fn handle_json_intake(
    State(state): State<AppState>,
    Json(req): Json<JsonIntakeRequest>,
) -> Result<(StatusCode, Json<IntakeResponse>), AppError> {
    let submission = record_from_submission(req.resume).map_err(AppError::Validation)?;

    let mut ctx = IntakeContext::new(UploadSource::StructuredJson);
    ctx.format = submission.format;
    ctx.original_filename = req.original_filename;
    if let Some(id) = req.position_id {
        ctx.linkage = resolve_position(&state, id).await;
    }

    let response = stage(&state, req.user_id, build_draft(submission.record, ctx)).await?;
    Ok((StatusCode::CREATED, Json(response)))
}
