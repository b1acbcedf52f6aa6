use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use tracing::info;

use crate::models::draft::PipelineLinkage;

pub const INITIAL_CANDIDATE_STATUS: &str = "pending";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("position {0} not found")]
    PositionNotFound(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of linking a candidate to a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Linked {
    pub association_id: i64,
    /// False when the association already existed.
    pub created: bool,
}

/// The recruiting pipeline (company > project > position > candidates).
/// Carried in `AppState` as `Arc<dyn PipelineStore>`.
#[async_trait]
pub trait PipelineStore: Send + Sync {
    /// Resolves a position with its project and company names.
    async fn position_context(&self, position_id: i64) -> Result<Option<PipelineLinkage>, PipelineError>;

    /// Associates a production résumé with a position. Idempotent per
    /// (position, résumé) pair.
    async fn link_candidate(
        &self,
        position_id: i64,
        resume_id: i64,
        notes: &str,
    ) -> Result<Linked, PipelineError>;
}

#[derive(Clone)]
pub struct PgPipelineStore {
    pool: PgPool,
}

impl PgPipelineStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PositionRow {
    position_id: i64,
    position_name: String,
    project_id: i64,
    project_name: String,
    company_id: i64,
    company_name: String,
}

#[async_trait]
impl PipelineStore for PgPipelineStore {
    async fn position_context(&self, position_id: i64) -> Result<Option<PipelineLinkage>, PipelineError> {
        let row: Option<PositionRow> = sqlx::query_as(
            r#"
            SELECT p.id AS position_id, p.name AS position_name,
                   pr.id AS project_id, pr.name AS project_name,
                   c.id AS company_id, c.name AS company_name
            FROM project_management.positions p
            JOIN project_management.projects pr ON pr.id = p.project_id
            JOIN project_management.companies c ON c.id = pr.company_id
            WHERE p.id = $1
            "#,
        )
        .bind(position_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| PipelineLinkage {
            position_id: r.position_id,
            position_name: Some(r.position_name),
            project_id: Some(r.project_id),
            project_name: Some(r.project_name),
            company_id: Some(r.company_id),
            company_name: Some(r.company_name),
        }))
    }

    async fn link_candidate(
        &self,
        position_id: i64,
        resume_id: i64,
        notes: &str,
    ) -> Result<Linked, PipelineError> {
        let mut tx = self.pool.begin().await?;

        // FOR SHARE keeps the position from being deleted until commit
        let exists: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM project_management.positions WHERE id = $1 FOR SHARE",
        )
        .bind(position_id)
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_none() {
            return Err(PipelineError::PositionNotFound(position_id));
        }

        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO project_management.position_candidates (position_id, resume_id, status, notes)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (position_id, resume_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(position_id)
        .bind(resume_id)
        .bind(INITIAL_CANDIDATE_STATUS)
        .bind(notes)
        .fetch_optional(&mut *tx)
        .await?;

        let linked = match inserted {
            Some(association_id) => Linked {
                association_id,
                created: true,
            },
            None => {
                let association_id = sqlx::query_scalar(
                    "SELECT id FROM project_management.position_candidates \
                     WHERE position_id = $1 AND resume_id = $2",
                )
                .bind(position_id)
                .bind(resume_id)
                .fetch_one(&mut *tx)
                .await?;
                Linked {
                    association_id,
                    created: false,
                }
            }
        };

        tx.commit().await?;

        if linked.created {
            info!("Linked résumé {resume_id} to position {position_id}");
        } else {
            info!("Résumé {resume_id} was already linked to position {position_id}");
        }
        Ok(linked)
    }
}
