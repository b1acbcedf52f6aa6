use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::drafts::{DraftPage, DraftPatch, DraftStore, DraftStoreError, Page};
use crate::models::draft::{DraftRecord, DraftStatus, NewDraft};

#[derive(Default)]
struct Inner {
    next_id: i64,
    drafts: BTreeMap<i64, DraftRecord>,
}

/// In-memory Draft Store with the same ownership rules as the Postgres one.
#[derive(Default, Clone)]
pub struct MemoryDraftStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDraftStore {
    fn with_owned<T>(
        &self,
        id: i64,
        owner: Uuid,
        f: impl FnOnce(&mut DraftRecord) -> Result<T, DraftStoreError>,
    ) -> Result<T, DraftStoreError> {
        let mut guard = self.inner.lock().expect("draft store mutex poisoned");
        match guard.drafts.get_mut(&id) {
            Some(draft) if draft.owner_id == owner => f(draft),
            _ => Err(DraftStoreError::NotFound(id)),
        }
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn save(&self, owner: Uuid, draft: NewDraft) -> Result<i64, DraftStoreError> {
        let mut guard = self.inner.lock().expect("draft store mutex poisoned");
        guard.next_id += 1;
        let id = guard.next_id;
        let now = Utc::now();
        guard.drafts.insert(
            id,
            DraftRecord {
                id,
                owner_id: owner,
                record: draft.record,
                provenance: draft.provenance,
                status: DraftStatus::PendingReview,
                review_notes: None,
                linkage: draft.linkage,
                promoted_resume_id: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn list(&self, owner: Uuid, page: Page) -> Result<DraftPage, DraftStoreError> {
        let page = page.normalized();
        let guard = self.inner.lock().expect("draft store mutex poisoned");
        let owned: Vec<&DraftRecord> = guard
            .drafts
            .values()
            .rev()
            .filter(|d| d.owner_id == owner)
            .collect();
        let total = owned.len() as i64;
        let drafts = owned
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size as usize)
            .cloned()
            .collect();
        Ok(DraftPage::new(drafts, total, page))
    }

    async fn get(&self, id: i64, owner: Uuid) -> Result<DraftRecord, DraftStoreError> {
        self.with_owned(id, owner, |draft| Ok(draft.clone()))
    }

    async fn update(
        &self,
        id: i64,
        owner: Uuid,
        patch: DraftPatch,
    ) -> Result<DraftRecord, DraftStoreError> {
        self.with_owned(id, owner, |draft| {
            if draft.status == DraftStatus::Promoted {
                return Err(DraftStoreError::Invalid(format!("draft {id} was already promoted")));
            }
            // apply to a copy so a rejected patch leaves the draft untouched
            let mut edited = draft.clone();
            patch.apply(&mut edited)?;
            edited.updated_at = Utc::now();
            *draft = edited.clone();
            Ok(edited)
        })
    }

    async fn delete(&self, id: i64, owner: Uuid) -> Result<(), DraftStoreError> {
        self.with_owned(id, owner, |_| Ok(()))?;
        let mut guard = self.inner.lock().expect("draft store mutex poisoned");
        guard.drafts.remove(&id);
        Ok(())
    }

    async fn delete_many(&self, ids: &[i64], owner: Uuid) -> Result<u64, DraftStoreError> {
        let mut guard = self.inner.lock().expect("draft store mutex poisoned");
        let mut removed = 0;
        for id in ids {
            if guard.drafts.get(id).is_some_and(|d| d.owner_id == owner) {
                guard.drafts.remove(id);
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn mark_promoted(
        &self,
        id: i64,
        owner: Uuid,
        resume_id: i64,
    ) -> Result<(), DraftStoreError> {
        self.with_owned(id, owner, |draft| {
            draft.status = DraftStatus::Promoted;
            draft.promoted_resume_id = Some(resume_id);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::draft::{PipelineLinkage, Provenance};
    use crate::models::resume::{EducationExperience, NormalizedRecord, WorkExperience};
    use chrono::NaiveDate;
    use serde_json::json;

    fn sample_record() -> NormalizedRecord {
        let mut record = NormalizedRecord::default();
        record.basic_info.chinese_name = Some("张三".to_string());
        record.basic_info.birth_date = NaiveDate::from_ymd_opt(1990, 1, 1);
        record.contact_info.phone = Some("13800138000".to_string());
        record.summary.skills = vec!["Rust".to_string(), "Postgres".to_string()];
        record.ai_analysis.swot = Some(json!({"strengths": ["执行力"]}));
        record.work_experiences.push(WorkExperience {
            company_name: Some("某公司".to_string()),
            start_date: NaiveDate::from_ymd_opt(2019, 7, 1),
            achievements: vec!["上线结算系统".to_string()],
            ..Default::default()
        });
        record.education_experiences.push(EducationExperience {
            school: Some("某大学".to_string()),
            degree: Some("本科".to_string()),
            ..Default::default()
        });
        record
    }

    fn new_draft() -> NewDraft {
        NewDraft {
            record: sample_record(),
            provenance: Provenance {
                original_filename: Some("cv.pdf".to_string()),
                upload_source: Some("web_upload".to_string()),
                ..Default::default()
            },
            linkage: Some(PipelineLinkage {
                position_id: 3,
                position_name: Some("后端工程师".to_string()),
                ..Default::default()
            }),
        }
    }

    #[tokio::test]
    async fn test_save_then_get_round_trips_structured_fields() {
        let store = MemoryDraftStore::default();
        let owner = Uuid::new_v4();
        let draft = new_draft();

        let id = store.save(owner, draft.clone()).await.unwrap();
        let loaded = store.get(id, owner).await.unwrap();

        assert_eq!(loaded.record, draft.record);
        assert_eq!(loaded.provenance, draft.provenance);
        assert_eq!(loaded.linkage, draft.linkage);
        assert_eq!(loaded.status, DraftStatus::PendingReview);
    }

    #[tokio::test]
    async fn test_other_owner_sees_not_found() {
        let store = MemoryDraftStore::default();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let id = store.save(owner, new_draft()).await.unwrap();

        assert!(matches!(store.get(id, stranger).await, Err(DraftStoreError::NotFound(_))));
        assert!(matches!(
            store.update(id, stranger, DraftPatch::default()).await,
            Err(DraftStoreError::NotFound(_))
        ));
        assert!(matches!(store.delete(id, stranger).await, Err(DraftStoreError::NotFound(_))));
        assert_eq!(store.delete_many(&[id], stranger).await.unwrap(), 0);
        assert_eq!(store.list(stranger, Page::default()).await.unwrap().total, 0);

        // still there for the owner
        assert!(store.get(id, owner).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_replaces_lists() {
        let store = MemoryDraftStore::default();
        let owner = Uuid::new_v4();
        let id = store.save(owner, new_draft()).await.unwrap();

        let patch: DraftPatch = serde_json::from_value(json!({
            "work_experiences": [
                {"company_name": "新公司A"},
                {"company_name": "新公司B"}
            ]
        }))
        .unwrap();
        let updated = store.update(id, owner, patch).await.unwrap();

        let names: Vec<_> = updated
            .record
            .work_experiences
            .iter()
            .filter_map(|w| w.company_name.as_deref())
            .collect();
        assert_eq!(names, vec!["新公司A", "新公司B"]);
        assert_eq!(updated.record.education_experiences.len(), 1);
        assert_eq!(store.get(id, owner).await.unwrap().record, updated.record);
    }

    #[tokio::test]
    async fn test_rejected_patch_leaves_draft_untouched() {
        let store = MemoryDraftStore::default();
        let owner = Uuid::new_v4();
        let id = store.save(owner, new_draft()).await.unwrap();

        let patch: DraftPatch = serde_json::from_value(json!({
            "basic_info": {"gender": "女"},
            "project_experiences": [42]
        }))
        .unwrap();
        assert!(store.update(id, owner, patch).await.is_err());
        assert_eq!(store.get(id, owner).await.unwrap().record, sample_record());
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_paged() {
        let store = MemoryDraftStore::default();
        let owner = Uuid::new_v4();
        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(store.save(owner, new_draft()).await.unwrap());
        }
        store.save(Uuid::new_v4(), new_draft()).await.unwrap();

        let page = store
            .list(owner, Page { page: 1, page_size: 2 })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        let listed: Vec<i64> = page.drafts.iter().map(|d| d.id).collect();
        assert_eq!(listed, vec![ids[2], ids[1]]);
    }

    #[tokio::test]
    async fn test_promoted_draft_is_no_longer_editable() {
        let store = MemoryDraftStore::default();
        let owner = Uuid::new_v4();
        let id = store.save(owner, new_draft()).await.unwrap();
        store.mark_promoted(id, owner, 99).await.unwrap();

        let draft = store.get(id, owner).await.unwrap();
        assert_eq!(draft.status, DraftStatus::Promoted);
        assert_eq!(draft.promoted_resume_id, Some(99));
        assert!(matches!(
            store.update(id, owner, DraftPatch::default()).await,
            Err(DraftStoreError::Invalid(_))
        ));
    }
}
