use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::correlation::CorrelationError;
use crate::drafts::DraftStoreError;
use crate::normalizer::NormalizeError;
use crate::reconcile::pipeline::PipelineError;
use crate::reconcile::production::ProductionStoreError;
use crate::reconcile::ReconcileError;
use crate::triggers::TriggerQueueError;

/// Longest slice of raw model output echoed back in an error body.
const RAW_OUTPUT_PREVIEW: usize = 2000;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Processing timeout: {0}")]
    ProcessingTimeout(String),

    #[error("Extraction failed: {message}")]
    ExtractionFailed {
        message: String,
        raw_output: Option<String>,
    },

    #[error("Correlation not found: {0}")]
    CorrelationNotFound(String),

    /// The production résumé exists but its position is gone.
    #[error("Position not found: {message}")]
    PositionNotFound { resume_id: i64, message: String },

    /// The production résumé exists but linking it failed.
    #[error("Partial failure: {message}")]
    PartialFailure { resume_id: i64, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("S3 error: {0}")]
    S3(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut extra = None;

        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UploadFailed(msg) => {
                tracing::warn!("Upload failed: {msg}");
                (StatusCode::SERVICE_UNAVAILABLE, "UPLOAD_FAILED", msg.clone())
            }
            AppError::ProcessingTimeout(msg) => {
                tracing::warn!("Processing timeout: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "PROCESSING_TIMEOUT",
                    msg.clone(),
                )
            }
            AppError::ExtractionFailed {
                message,
                raw_output,
            } => {
                tracing::error!("Extraction failed: {message}");
                if let Some(raw) = raw_output {
                    extra = Some(("raw_output", json!(preview(raw))));
                }
                (StatusCode::BAD_GATEWAY, "EXTRACTION_FAILED", message.clone())
            }
            AppError::CorrelationNotFound(msg) => (
                StatusCode::BAD_REQUEST,
                "CORRELATION_NOT_FOUND",
                msg.clone(),
            ),
            AppError::PositionNotFound { resume_id, message } => {
                extra = Some(("resume_id", json!(resume_id)));
                (StatusCode::MULTI_STATUS, "POSITION_NOT_FOUND", message.clone())
            }
            AppError::PartialFailure { resume_id, message } => {
                extra = Some(("resume_id", json!(resume_id)));
                (StatusCode::MULTI_STATUS, "PARTIAL_FAILURE", message.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Cache(msg) => {
                tracing::error!("Cache error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CACHE_ERROR",
                    "A cache error occurred".to_string(),
                )
            }
            AppError::S3(msg) => {
                tracing::error!("S3 error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "S3_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let mut body = json!({
            "error": {
                "code": code,
                "message": message
            }
        });
        if let Some((key, value)) = extra {
            body[key] = value;
        }

        (status, Json(body)).into_response()
    }
}

fn preview(raw: &str) -> &str {
    match raw.char_indices().nth(RAW_OUTPUT_PREVIEW) {
        Some((end, _)) => &raw[..end],
        None => raw,
    }
}

impl From<NormalizeError> for AppError {
    fn from(e: NormalizeError) -> Self {
        let message = e.to_string();
        match e {
            NormalizeError::UploadFailed(_) => AppError::UploadFailed(message),
            NormalizeError::ProcessingTimeout { .. } => AppError::ProcessingTimeout(message),
            NormalizeError::ExtractionFailed { raw, .. } => AppError::ExtractionFailed {
                message,
                raw_output: raw,
            },
        }
    }
}

impl From<DraftStoreError> for AppError {
    fn from(e: DraftStoreError) -> Self {
        match e {
            DraftStoreError::NotFound(id) => AppError::NotFound(format!("Draft {id} not found")),
            DraftStoreError::Invalid(msg) => AppError::Validation(msg),
            DraftStoreError::Database(e) => AppError::Database(e),
            DraftStoreError::Serialization(e) => AppError::Internal(e.into()),
        }
    }
}

impl From<CorrelationError> for AppError {
    fn from(e: CorrelationError) -> Self {
        match e {
            CorrelationError::NotFound(_) => AppError::CorrelationNotFound(e.to_string()),
            CorrelationError::Redis(_) | CorrelationError::Codec(_) => AppError::Cache(e.to_string()),
        }
    }
}

impl From<TriggerQueueError> for AppError {
    fn from(e: TriggerQueueError) -> Self {
        AppError::Cache(e.to_string())
    }
}

impl From<ProductionStoreError> for AppError {
    fn from(e: ProductionStoreError) -> Self {
        match e {
            ProductionStoreError::Database(e) => AppError::Database(e),
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::PositionNotFound(id) => {
                AppError::NotFound(format!("Position {id} not found"))
            }
            PipelineError::Database(e) => AppError::Database(e),
        }
    }
}

impl From<ReconcileError> for AppError {
    fn from(e: ReconcileError) -> Self {
        let message = e.to_string();
        match e {
            ReconcileError::NotFound(id) => AppError::NotFound(format!("Draft {id} not found")),
            ReconcileError::PositionNotFound { resume_id, .. } => {
                AppError::PositionNotFound { resume_id, message }
            }
            ReconcileError::PartialFailure { resume_id, .. } => {
                AppError::PartialFailure { resume_id, message }
            }
            ReconcileError::SchemaDrift(_) => AppError::Internal(anyhow::anyhow!(message)),
            ReconcileError::Drafts(e) => e.into(),
            ReconcileError::Production(e) => e.into(),
        }
    }
}
