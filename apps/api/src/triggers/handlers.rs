use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::state::AppState;
use crate::triggers::{decode_entry, QueuedTask, TriggerTask};

#[derive(Deserialize)]
pub struct TriggerRequest {
    pub keywords_main: String,
    pub keywords_position: String,
    pub keywords_company: String,
    #[serde(default, alias = "task_id")]
    pub task_token: Option<String>,
    pub company_id: Option<i64>,
    pub company_name: Option<String>,
    pub project_id: Option<i64>,
    pub project_name: Option<String>,
    pub position_id: Option<i64>,
    pub position_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub task: TriggerTask,
    pub queue_length: u64,
}

#[derive(Serialize)]
pub struct QueueView {
    pub queue_name: String,
    pub queue_length: usize,
    pub tasks: Vec<QueuedTask>,
}

#[derive(Serialize)]
pub struct ClearResponse {
    pub cleared: u64,
}

/// POST /api/v1/triggers
pub async fn handle_trigger(
    State(state): State<AppState>,
    Json(req): Json<TriggerRequest>,
) -> Result<(StatusCode, Json<TriggerResponse>), AppError> {
    let keywords_main = req.keywords_main.trim().to_string();
    if keywords_main.is_empty() {
        return Err(AppError::Validation("keywords_main must not be empty".to_string()));
    }

    let task = TriggerTask {
        keywords_main,
        keywords_position: req.keywords_position.trim().to_string(),
        keywords_company: req.keywords_company.trim().to_string(),
        task_token: req.task_token.filter(|t| !t.trim().is_empty()),
        company_id: req.company_id,
        company_name: req.company_name,
        project_id: req.project_id,
        project_name: req.project_name,
        position_id: req.position_id,
        position_name: req.position_name,
        queued_at: Utc::now(),
    };
    let queue_length = state.triggers.push(&task).await?;

    Ok((StatusCode::CREATED, Json(TriggerResponse { task, queue_length })))
}

/// GET /api/v1/triggers/queue
///
/// Lists queued tasks oldest first, each with the pipeline selection still
/// cached under its task token. Lookups are best-effort.
pub async fn handle_queue_status(State(state): State<AppState>) -> Result<Json<QueueView>, AppError> {
    let entries = state.triggers.entries().await?;
    let mut tasks = Vec::with_capacity(entries.len());

    for raw in entries {
        let task = match decode_entry(raw) {
            Ok(task) => task,
            Err(unreadable) => {
                warn!("Unreadable entry in {}", state.triggers.name());
                tasks.push(unreadable);
                continue;
            }
        };

        let position_info = match task.task_token.as_deref() {
            Some(token) => state.correlation.peek(token).await.unwrap_or_else(|e| {
                warn!("Selection lookup for task {token} failed: {e}");
                None
            }),
            None => None,
        };
        tasks.push(QueuedTask::Task {
            task,
            position_info,
        });
    }

    Ok(Json(QueueView {
        queue_name: state.triggers.name().to_string(),
        queue_length: tasks.len(),
        tasks,
    }))
}

/// DELETE /api/v1/triggers/queue
pub async fn handle_clear_queue(State(state): State<AppState>) -> Result<Json<ClearResponse>, AppError> {
    let cleared = state.triggers.clear().await?;
    info!("Trigger queue {} cleared ({cleared} tasks)", state.triggers.name());
    Ok(Json(ClearResponse { cleared }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::correlation::PositionSelection;
    use crate::models::draft::PipelineLinkage;
    use crate::state::testing::memory_state;
    use crate::triggers::memory::MemoryTriggerQueue;
    use uuid::Uuid;

    fn request(task_token: Option<&str>) -> TriggerRequest {
        TriggerRequest {
            keywords_main: " Rust 后端 ".to_string(),
            keywords_position: "架构师".to_string(),
            keywords_company: "某科技".to_string(),
            task_token: task_token.map(str::to_string),
            company_id: None,
            company_name: None,
            project_id: None,
            project_name: None,
            position_id: Some(7),
            position_name: Some("后端工程师".to_string()),
        }
    }

    #[tokio::test]
    async fn test_queue_view_joins_cached_selection() {
        let queue = MemoryTriggerQueue::default();
        let mut state = memory_state();
        state.triggers = Arc::new(queue.clone());

        let selection = PositionSelection {
            owner_id: Uuid::new_v4(),
            linkage: PipelineLinkage {
                position_id: 7,
                ..Default::default()
            },
        };
        state.correlation.put("tok", &selection).await.unwrap();

        let (status, Json(pushed)) = handle_trigger(State(state.clone()), Json(request(Some("tok"))))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(pushed.task.keywords_main, "Rust 后端");
        handle_trigger(State(state.clone()), Json(request(None)))
            .await
            .unwrap();
        queue.push_raw("not json");

        let Json(view) = handle_queue_status(State(state.clone())).await.unwrap();
        assert_eq!(view.queue_length, 3);
        match &view.tasks[0] {
            QueuedTask::Task { task, position_info } => {
                assert_eq!(task.task_token.as_deref(), Some("tok"));
                assert_eq!(position_info.as_ref(), Some(&selection));
            }
            other => panic!("expected a task, got {other:?}"),
        }
        assert!(matches!(&view.tasks[1], QueuedTask::Task { position_info: None, .. }));
        assert!(matches!(&view.tasks[2], QueuedTask::Unreadable { .. }));

        // viewing the queue does not consume the selection
        assert_eq!(state.correlation.take("tok").await.unwrap(), selection);

        let Json(cleared) = handle_clear_queue(State(state.clone())).await.unwrap();
        assert_eq!(cleared.cleared, 3);
        let Json(view) = handle_queue_status(State(state)).await.unwrap();
        assert!(view.tasks.is_empty());
    }

    #[tokio::test]
    async fn test_blank_main_keywords_are_rejected() {
        let mut req = request(None);
        req.keywords_main = "  ".to_string();
        let err = handle_trigger(State(memory_state()), Json(req)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
