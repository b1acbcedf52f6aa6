use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::drafts::{DraftStore, DraftStoreError};
use crate::models::draft::DraftRecord;
use crate::reconcile::field_map::{
    project, EDUCATION_FIELDS, FIELD_MAP_VERSION, PROJECT_FIELDS, RESUME_FIELDS, WORK_FIELDS,
};
use crate::reconcile::pipeline::{PipelineError, PipelineStore};
use crate::reconcile::production::{NewProductionResume, ProductionStore, ProductionStoreError};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("draft {0} not found")]
    NotFound(i64),

    #[error("position {position_id} no longer exists; résumé {resume_id} was created without a pipeline link")]
    PositionNotFound { resume_id: i64, position_id: i64 },

    #[error("résumé {resume_id} was created but linking it to position {position_id} failed: {detail}")]
    PartialFailure {
        resume_id: i64,
        position_id: i64,
        detail: String,
    },

    #[error("field map is out of step with the draft schema: missing {0}")]
    SchemaDrift(&'static str),

    #[error("draft store error: {0}")]
    Drafts(#[source] DraftStoreError),

    #[error("production store error: {0}")]
    Production(#[from] ProductionStoreError),
}

impl From<DraftStoreError> for ReconcileError {
    fn from(e: DraftStoreError) -> Self {
        match e {
            DraftStoreError::NotFound(id) => ReconcileError::NotFound(id),
            other => ReconcileError::Drafts(other),
        }
    }
}

impl ReconcileError {
    /// Production résumé created before the failure, if any.
    pub fn created_resume_id(&self) -> Option<i64> {
        match self {
            ReconcileError::PositionNotFound { resume_id, .. }
            | ReconcileError::PartialFailure { resume_id, .. } => Some(*resume_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LinkageOutcome {
    /// The draft carried no pipeline linkage.
    NotRequested,
    Linked {
        position_id: i64,
        association_id: i64,
        /// False when the association already existed.
        created: bool,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct PromotionOutcome {
    pub draft_id: i64,
    pub resume_id: i64,
    /// The draft had been promoted before; no new résumé was inserted.
    pub already_promoted: bool,
    pub position_linked: bool,
    pub linkage: LinkageOutcome,
    /// Existing résumé from another draft with the same name and phone.
    pub possible_duplicate_of: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub draft_id: i64,
    pub success: bool,
    pub resume_id: Option<i64>,
    pub outcome: Option<PromotionOutcome>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub results: Vec<BatchItem>,
    pub succeeded: usize,
    pub failed: usize,
}

/// Promotes reviewed drafts into the production store and links them into
/// the recruiting pipeline.
#[derive(Clone)]
pub struct Reconciler {
    drafts: Arc<dyn DraftStore>,
    production: Arc<dyn ProductionStore>,
    pipeline: Arc<dyn PipelineStore>,
}

impl Reconciler {
    pub fn new(
        drafts: Arc<dyn DraftStore>,
        production: Arc<dyn ProductionStore>,
        pipeline: Arc<dyn PipelineStore>,
    ) -> Self {
        Self {
            drafts,
            production,
            pipeline,
        }
    }

    /// Copies the draft into production (once) and, when it carries a
    /// position, ensures the candidate association exists.
    ///
    /// The production résumé is never rolled back because linking failed;
    /// the error carries its id instead. Re-running `promote` on the same
    /// draft retries only the link.
    pub async fn promote(&self, draft_id: i64, owner: Uuid) -> Result<PromotionOutcome, ReconcileError> {
        let draft = self.drafts.get(draft_id, owner).await?;

        let (resume_id, already_promoted, possible_duplicate_of) =
            match self.existing_resume(&draft).await? {
                Some(resume_id) => (resume_id, true, None),
                None => {
                    let (resume_id, duplicate) = self.insert_production(&draft).await?;
                    (resume_id, false, duplicate)
                }
            };

        if draft.promoted_resume_id != Some(resume_id) {
            if let Err(e) = self.drafts.mark_promoted(draft.id, owner, resume_id).await {
                // source_draft_id on the résumé still prevents a second insert
                error!("Could not mark draft {} as promoted to {resume_id}: {e}", draft.id);
            }
        }

        let linkage = self.link(&draft, resume_id).await?;
        let position_linked = matches!(linkage, LinkageOutcome::Linked { .. });

        info!(
            "Promoted draft {} to résumé {resume_id} (already promoted: {already_promoted}, linked: {position_linked})",
            draft.id
        );

        Ok(PromotionOutcome {
            draft_id: draft.id,
            resume_id,
            already_promoted,
            position_linked,
            linkage,
            possible_duplicate_of,
        })
    }

    /// Promotes each draft independently; one failure never stops the batch.
    pub async fn promote_many(&self, draft_ids: &[i64], owner: Uuid) -> BatchOutcome {
        let mut results = Vec::with_capacity(draft_ids.len());

        for &draft_id in draft_ids {
            let item = match self.promote(draft_id, owner).await {
                Ok(outcome) => BatchItem {
                    draft_id,
                    success: true,
                    resume_id: Some(outcome.resume_id),
                    outcome: Some(outcome),
                    error: None,
                },
                Err(e) => {
                    warn!("Batch promotion of draft {draft_id} failed: {e}");
                    BatchItem {
                        draft_id,
                        success: false,
                        resume_id: e.created_resume_id(),
                        outcome: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            results.push(item);
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        BatchOutcome {
            failed: results.len() - succeeded,
            succeeded,
            results,
        }
    }

    async fn existing_resume(&self, draft: &DraftRecord) -> Result<Option<i64>, ReconcileError> {
        if let Some(resume_id) = draft.promoted_resume_id {
            return Ok(Some(resume_id));
        }
        let found = self.production.find_by_source_draft(draft.id).await?;
        if let Some(resume_id) = found {
            warn!(
                "Draft {} was inserted as résumé {resume_id} but never marked promoted",
                draft.id
            );
        }
        Ok(found)
    }

    async fn insert_production(&self, draft: &DraftRecord) -> Result<(i64, Option<i64>), ReconcileError> {
        let resume = to_production(draft)?;

        let duplicate = match resume.natural_key() {
            Some((name, phone)) => {
                self.production
                    .find_by_natural_key(name, phone, draft.id)
                    .await?
            }
            None => None,
        };
        if let Some(existing) = duplicate {
            warn!(
                "Draft {} matches existing résumé {existing} by name and phone",
                draft.id
            );
        }

        let resume_id = self.production.insert(&resume).await?;
        debug!("Draft {} inserted with field map v{FIELD_MAP_VERSION}", draft.id);
        Ok((resume_id, duplicate))
    }

    async fn link(&self, draft: &DraftRecord, resume_id: i64) -> Result<LinkageOutcome, ReconcileError> {
        let Some(linkage) = &draft.linkage else {
            return Ok(LinkageOutcome::NotRequested);
        };
        let position_id = linkage.position_id;

        let notes = format!(
            "Linked from draft {} (uploaded {})",
            draft.id,
            draft.created_at.format("%Y-%m-%d %H:%M:%S")
        );

        match self.pipeline.link_candidate(position_id, resume_id, &notes).await {
            Ok(linked) => Ok(LinkageOutcome::Linked {
                position_id,
                association_id: linked.association_id,
                created: linked.created,
            }),
            Err(PipelineError::PositionNotFound(_)) => {
                warn!("Position {position_id} vanished before résumé {resume_id} could be linked");
                Err(ReconcileError::PositionNotFound {
                    resume_id,
                    position_id,
                })
            }
            Err(e) => {
                error!("Linking résumé {resume_id} to position {position_id} failed: {e}");
                Err(ReconcileError::PartialFailure {
                    resume_id,
                    position_id,
                    detail: e.to_string(),
                })
            }
        }
    }
}

/// Projects a draft through the field map.
fn to_production(draft: &DraftRecord) -> Result<NewProductionResume, ReconcileError> {
    let record = &draft.record;
    Ok(NewProductionResume {
        source_draft_id: draft.id,
        fields: project(draft, RESUME_FIELDS).map_err(ReconcileError::SchemaDrift)?,
        work_experiences: record
            .work_experiences
            .iter()
            .map(|e| project(e, WORK_FIELDS))
            .collect::<Result<_, _>>()
            .map_err(ReconcileError::SchemaDrift)?,
        education_experiences: record
            .education_experiences
            .iter()
            .map(|e| project(e, EDUCATION_FIELDS))
            .collect::<Result<_, _>>()
            .map_err(ReconcileError::SchemaDrift)?,
        project_experiences: record
            .project_experiences
            .iter()
            .map(|e| project(e, PROJECT_FIELDS))
            .collect::<Result<_, _>>()
            .map_err(ReconcileError::SchemaDrift)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drafts::memory::MemoryDraftStore;
    use crate::models::draft::{DraftStatus, NewDraft, PipelineLinkage, Provenance};
    use crate::models::resume::{NormalizedRecord, WorkExperience};
    use crate::reconcile::field_map::ColumnValue;
    use crate::reconcile::pipeline::memory::MemoryPipelineStore;
    use crate::reconcile::production::memory::MemoryProductionStore;
    use chrono::NaiveDate;

    struct Harness {
        drafts: MemoryDraftStore,
        production: MemoryProductionStore,
        pipeline: MemoryPipelineStore,
        reconciler: Reconciler,
    }

    fn harness() -> Harness {
        let drafts = MemoryDraftStore::default();
        let production = MemoryProductionStore::default();
        let pipeline = MemoryPipelineStore::default().with_position(7, "后端工程师");
        let reconciler = Reconciler::new(
            Arc::new(drafts.clone()),
            Arc::new(production.clone()),
            Arc::new(pipeline.clone()),
        );
        Harness {
            drafts,
            production,
            pipeline,
            reconciler,
        }
    }

    fn new_draft(position_id: Option<i64>) -> NewDraft {
        let mut record = NormalizedRecord::default();
        record.basic_info.chinese_name = Some("张三".to_string());
        record.basic_info.birth_date = NaiveDate::from_ymd_opt(1990, 1, 1);
        record.contact_info.phone = Some("13800138000".to_string());
        record.summary.skills = vec!["Rust".to_string()];
        record.work_experiences.push(WorkExperience {
            company_name: Some("某公司".to_string()),
            start_date: NaiveDate::from_ymd_opt(2020, 3, 1),
            ..Default::default()
        });
        NewDraft {
            record,
            provenance: Provenance {
                original_filename: Some("zhangsan.pdf".to_string()),
                upload_source: Some("web_upload".to_string()),
                task_token: Some("tok".to_string()),
                ..Default::default()
            },
            linkage: position_id.map(|position_id| PipelineLinkage {
                position_id,
                ..Default::default()
            }),
        }
    }

    #[tokio::test]
    async fn test_promote_without_linkage_creates_one_resume_and_no_association() {
        let h = harness();
        let owner = Uuid::new_v4();
        let draft_id = h.drafts.save(owner, new_draft(None)).await.unwrap();

        let outcome = h.reconciler.promote(draft_id, owner).await.unwrap();

        assert_eq!(outcome.linkage, LinkageOutcome::NotRequested);
        assert!(!outcome.position_linked);
        assert!(!outcome.already_promoted);
        assert_eq!(h.production.count(), 1);
        assert!(h.pipeline.associations().is_empty());

        let stored = h.production.get(outcome.resume_id).await.unwrap().unwrap();
        assert_eq!(stored["chinese_name"], "张三");
        assert_eq!(stored["birth_date"], "1990-01-01");
        assert_eq!(stored["work_experiences"][0]["start_date"], "2020-03-01");
        assert!(stored.get("task_token").is_none());

        let draft = h.drafts.get(draft_id, owner).await.unwrap();
        assert_eq!(draft.status, DraftStatus::Promoted);
        assert_eq!(draft.promoted_resume_id, Some(outcome.resume_id));
    }

    #[tokio::test]
    async fn test_promote_with_linkage_creates_pending_association() {
        let h = harness();
        let owner = Uuid::new_v4();
        let draft_id = h.drafts.save(owner, new_draft(Some(7))).await.unwrap();

        let outcome = h.reconciler.promote(draft_id, owner).await.unwrap();

        assert!(outcome.position_linked);
        let associations = h.pipeline.associations();
        assert_eq!(associations.len(), 1);
        assert_eq!(associations[0].resume_id, outcome.resume_id);
        assert_eq!(associations[0].status, "pending");
        assert!(associations[0].notes.contains(&format!("draft {draft_id}")));
    }

    #[tokio::test]
    async fn test_deleted_position_reports_created_resume() {
        let h = harness();
        let owner = Uuid::new_v4();
        let draft_id = h.drafts.save(owner, new_draft(Some(7))).await.unwrap();
        h.pipeline.delete_position(7);

        let err = h.reconciler.promote(draft_id, owner).await.unwrap_err();
        let resume_id = match err {
            ReconcileError::PositionNotFound {
                resume_id,
                position_id,
            } => {
                assert_eq!(position_id, 7);
                resume_id
            }
            other => panic!("expected PositionNotFound, got {other:?}"),
        };

        // the résumé survives and can be read back
        let stored = h.production.get(resume_id).await.unwrap();
        assert!(stored.is_some());
        assert!(h.pipeline.associations().is_empty());
    }

    #[tokio::test]
    async fn test_second_promote_never_duplicates_association_or_resume() {
        let h = harness();
        let owner = Uuid::new_v4();
        let draft_id = h.drafts.save(owner, new_draft(Some(7))).await.unwrap();

        let first = h.reconciler.promote(draft_id, owner).await.unwrap();
        let second = h.reconciler.promote(draft_id, owner).await.unwrap();

        assert_eq!(first.resume_id, second.resume_id);
        assert!(second.already_promoted);
        assert_eq!(
            second.linkage,
            LinkageOutcome::Linked {
                position_id: 7,
                association_id: 1,
                created: false
            }
        );
        assert_eq!(h.production.count(), 1);
        assert_eq!(h.pipeline.associations().len(), 1);
    }

    #[tokio::test]
    async fn test_repromote_repairs_missing_link() {
        let h = harness();
        let owner = Uuid::new_v4();
        let draft_id = h.drafts.save(owner, new_draft(Some(8))).await.unwrap();

        let err = h.reconciler.promote(draft_id, owner).await.unwrap_err();
        let resume_id = err.created_resume_id().unwrap();

        // position 8 appears later; promoting again only adds the link
        let _ = h.pipeline.clone().with_position(8, "数据分析师");
        let outcome = h.reconciler.promote(draft_id, owner).await.unwrap();

        assert_eq!(outcome.resume_id, resume_id);
        assert!(outcome.already_promoted);
        assert!(outcome.position_linked);
        assert_eq!(h.production.count(), 1);
        assert_eq!(h.pipeline.associations().len(), 1);
    }

    #[tokio::test]
    async fn test_unmarked_insert_is_recovered_by_source_draft() {
        let h = harness();
        let owner = Uuid::new_v4();
        let draft_id = h.drafts.save(owner, new_draft(None)).await.unwrap();

        // simulate a crash between the production commit and the draft marker
        let draft = h.drafts.get(draft_id, owner).await.unwrap();
        let resume_id = h.production.insert(&to_production(&draft).unwrap()).await.unwrap();

        let outcome = h.reconciler.promote(draft_id, owner).await.unwrap();
        assert_eq!(outcome.resume_id, resume_id);
        assert!(outcome.already_promoted);
        assert_eq!(h.production.count(), 1);
        assert_eq!(
            h.drafts.get(draft_id, owner).await.unwrap().promoted_resume_id,
            Some(resume_id)
        );
    }

    #[tokio::test]
    async fn test_same_person_from_another_draft_is_flagged() {
        let h = harness();
        let owner = Uuid::new_v4();
        let first_draft = h.drafts.save(owner, new_draft(None)).await.unwrap();
        let second_draft = h.drafts.save(owner, new_draft(None)).await.unwrap();

        let first = h.reconciler.promote(first_draft, owner).await.unwrap();
        let second = h.reconciler.promote(second_draft, owner).await.unwrap();

        assert_eq!(first.possible_duplicate_of, None);
        assert_eq!(second.possible_duplicate_of, Some(first.resume_id));
        assert_ne!(first.resume_id, second.resume_id);
    }

    #[tokio::test]
    async fn test_other_owner_cannot_promote() {
        let h = harness();
        let owner = Uuid::new_v4();
        let draft_id = h.drafts.save(owner, new_draft(None)).await.unwrap();

        let err = h.reconciler.promote(draft_id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ReconcileError::NotFound(id) if id == draft_id));
        assert_eq!(h.production.count(), 0);
    }

    #[tokio::test]
    async fn test_batch_continues_past_failures() {
        let h = harness();
        let owner = Uuid::new_v4();
        let ok = h.drafts.save(owner, new_draft(Some(7))).await.unwrap();
        let unlinked = h.drafts.save(owner, new_draft(Some(99))).await.unwrap();

        let batch = h.reconciler.promote_many(&[ok, 12345, unlinked], owner).await;

        assert_eq!(batch.succeeded, 1);
        assert_eq!(batch.failed, 2);
        assert!(batch.results[0].success);
        assert!(!batch.results[1].success);
        assert_eq!(batch.results[1].resume_id, None);
        // position 99 does not exist, but the résumé was still created
        assert!(batch.results[2].resume_id.is_some());
        assert_eq!(h.production.count(), 2);
    }

    #[test]
    fn test_projection_keeps_draft_only_fields_out() {
        let draft = DraftRecord {
            id: 3,
            owner_id: Uuid::new_v4(),
            record: new_draft(None).record,
            provenance: new_draft(None).provenance,
            status: DraftStatus::PendingReview,
            review_notes: Some("checked".to_string()),
            linkage: None,
            promoted_resume_id: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let resume = to_production(&draft).unwrap();
        assert_eq!(resume.source_draft_id, 3);
        assert_eq!(resume.fields.len(), RESUME_FIELDS.len());
        assert!(resume
            .fields
            .iter()
            .any(|(n, v)| *n == "original_filename"
                && *v == ColumnValue::Text(Some("zhangsan.pdf".to_string()))));
        assert_eq!(resume.work_experiences.len(), 1);
    }
}
