use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;

use crate::drafts::handlers::{BatchRequest, UserIdQuery};
use crate::errors::AppError;
use crate::reconcile::reconciler::{BatchOutcome, PromotionOutcome};
use crate::state::AppState;

/// POST /api/v1/drafts/:id/promote
///
/// A lost position or failed link answers 207 with the created `resume_id`;
/// calling again retries only the link.
pub async fn handle_promote(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<PromotionOutcome>, AppError> {
    let outcome = state.reconciler.promote(id, params.user_id).await?;
    Ok(Json(outcome))
}

/// POST /api/v1/drafts/batch/promote
pub async fn handle_batch_promote(
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<BatchOutcome>, AppError> {
    if req.draft_ids.is_empty() {
        return Err(AppError::Validation("draft_ids must not be empty".to_string()));
    }
    let outcome = state.reconciler.promote_many(&req.draft_ids, req.user_id).await;
    Ok(Json(outcome))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let resume = state
        .production
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Résumé {id} not found")))?;
    Ok(Json(resume))
}
