use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

use crate::correlation::{new_task_token, PositionSelection};
use crate::errors::AppError;
use crate::normalizer::handlers::{stage, IntakeResponse};
use crate::normalizer::mapping::{build_draft, record_from_submission, IntakeContext, UploadSource};
use crate::state::AppState;

#[derive(Serialize, Deserialize)]
pub struct TaskTokenResponse {
    pub task_token: String,
}

#[derive(Deserialize)]
pub struct SelectionRequest {
    pub user_id: Uuid,
    pub position_id: i64,
}

#[derive(Deserialize)]
pub struct TaskSubmission {
    pub resume: Value,
    pub original_filename: Option<String>,
}

/// POST /api/v1/intake/tasks
pub async fn handle_new_task() -> (StatusCode, Json<TaskTokenResponse>) {
    let task_token = new_task_token();
    info!("Issued task token {task_token}");
    (StatusCode::CREATED, Json(TaskTokenResponse { task_token }))
}

/// PUT /api/v1/intake/tasks/:token/selection
///
/// Records which position the agent's upcoming submission belongs to.
pub async fn handle_put_selection(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<SelectionRequest>,
) -> Result<Json<PositionSelection>, AppError> {
    let linkage = state
        .pipeline
        .position_context(req.position_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Position {} not found", req.position_id)))?;

    let selection = PositionSelection {
        owner_id: req.user_id,
        linkage,
    };
    state.correlation.put(&token, &selection).await?;
    info!(
        "Stored selection for task {token}: position {}",
        selection.linkage.position_id
    );
    Ok(Json(selection))
}

/// POST /api/v1/intake/tasks/:token/submission
///
/// Stages the agent's résumé under the selection stored for the token. The
/// selection is consumed; it is put back only if staging fails.
pub async fn handle_task_submission(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<TaskSubmission>,
) -> Result<(StatusCode, Json<IntakeResponse>), AppError> {
    // validate before consuming the selection
    let submission = record_from_submission(req.resume).map_err(AppError::Validation)?;

    let selection = state.correlation.take(&token).await?;

    let mut ctx = IntakeContext::new(UploadSource::AgentTask);
    ctx.format = submission.format;
    ctx.original_filename = req.original_filename;
    ctx.task_token = Some(token.clone());
    ctx.linkage = Some(selection.linkage.clone());

    match stage(&state, selection.owner_id, build_draft(submission.record, ctx)).await {
        Ok(response) => Ok((StatusCode::CREATED, Json(response))),
        Err(e) => {
            if let Err(restore) = state.correlation.put(&token, &selection).await {
                error!("Could not restore selection for task {token}: {restore}");
            }
            Err(e)
        }
    }
}
