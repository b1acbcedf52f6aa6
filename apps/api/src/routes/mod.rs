pub mod health;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::correlation::handlers as tasks;
use crate::drafts::handlers as drafts;
use crate::normalizer::handlers as intake;
use crate::reconcile::handlers as promotion;
use crate::state::AppState;
use crate::triggers::handlers as triggers;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Intake
        .route("/api/v1/intake/upload", post(intake::handle_upload))
        .route("/api/v1/intake/json", post(intake::handle_json_intake))
        .route("/api/v1/intake/tasks", post(tasks::handle_new_task))
        .route(
            "/api/v1/intake/tasks/:token/selection",
            put(tasks::handle_put_selection),
        )
        .route(
            "/api/v1/intake/tasks/:token/submission",
            post(tasks::handle_task_submission),
        )
        // Sourcing agent queue
        .route("/api/v1/triggers", post(triggers::handle_trigger))
        .route(
            "/api/v1/triggers/queue",
            get(triggers::handle_queue_status).delete(triggers::handle_clear_queue),
        )
        // Draft review
        .route("/api/v1/drafts", get(drafts::handle_list_drafts))
        .route(
            "/api/v1/drafts/batch",
            delete(drafts::handle_batch_delete),
        )
        .route(
            "/api/v1/drafts/batch/promote",
            post(promotion::handle_batch_promote),
        )
        .route(
            "/api/v1/drafts/:id",
            get(drafts::handle_get_draft)
                .put(drafts::handle_update_draft)
                .delete(drafts::handle_delete_draft),
        )
        .route("/api/v1/drafts/:id/promote", post(promotion::handle_promote))
        // Production
        .route("/api/v1/resumes/:id", get(promotion::handle_get_resume))
        .with_state(state)
}
