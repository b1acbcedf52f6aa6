use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::drafts::{DraftPage, DraftPatch, Page};
use crate::errors::AppError;
use crate::models::draft::DraftRecord;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub user_id: Uuid,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Deserialize)]
pub struct BatchRequest {
    pub user_id: Uuid,
    pub draft_ids: Vec<i64>,
}

#[derive(Serialize)]
pub struct BatchDeleteResponse {
    pub requested: usize,
    pub deleted: u64,
}

/// GET /api/v1/drafts
pub async fn handle_list_drafts(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<DraftPage>, AppError> {
    let defaults = Page::default();
    let page = Page {
        page: params.page.unwrap_or(defaults.page),
        page_size: params.page_size.unwrap_or(defaults.page_size),
    }
    .normalized();

    let drafts = state.drafts.list(params.user_id, page).await?;
    Ok(Json(drafts))
}

/// GET /api/v1/drafts/:id
pub async fn handle_get_draft(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<DraftRecord>, AppError> {
    let draft = state.drafts.get(id, params.user_id).await?;
    Ok(Json(draft))
}

/// PUT /api/v1/drafts/:id
pub async fn handle_update_draft(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<UserIdQuery>,
    Json(patch): Json<DraftPatch>,
) -> Result<Json<DraftRecord>, AppError> {
    let draft = state.drafts.update(id, params.user_id, patch).await?;
    Ok(Json(draft))
}

/// DELETE /api/v1/drafts/:id
pub async fn handle_delete_draft(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    state.drafts.delete(id, params.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/drafts/batch
///
/// Ids the caller does not own are skipped, not reported.
pub async fn handle_batch_delete(
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<BatchDeleteResponse>, AppError> {
    if req.draft_ids.is_empty() {
        return Err(AppError::Validation("draft_ids must not be empty".to_string()));
    }
    let deleted = state.drafts.delete_many(&req.draft_ids, req.user_id).await?;
    Ok(Json(BatchDeleteResponse {
        requested: req.draft_ids.len(),
        deleted,
    }))
}
