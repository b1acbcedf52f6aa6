use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::drafts::{DraftPage, DraftPatch, DraftStore, DraftStoreError, Page};
use crate::models::draft::{DraftRecord, DraftStatus, NewDraft, PipelineLinkage, Provenance};
use crate::models::resume::NormalizedRecord;

const WORK_TABLE: &str = "draft.draft_work_experiences";
const EDUCATION_TABLE: &str = "draft.draft_education_experiences";
const PROJECT_TABLE: &str = "draft.draft_project_experiences";

const DRAFT_COLUMNS: &str = "id, owner_id, basic_info, contact_info, summary, expectations, \
    ai_analysis, trace_info, original_filename, storage_path, storage_url, upload_source, \
    file_format, service_file_id, avatar_url, task_token, status, review_notes, \
    position_id, position_name, project_id, project_name, company_id, company_name, \
    promoted_resume_id, created_at, updated_at";

/// Postgres-backed Draft Store (`draft` schema). Group data is kept as JSONB,
/// list entries in ordered child tables.
#[derive(Clone)]
pub struct PgDraftStore {
    pool: PgPool,
}

impl PgDraftStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct DraftRow {
    id: i64,
    owner_id: Uuid,
    basic_info: Value,
    contact_info: Value,
    summary: Value,
    expectations: Value,
    ai_analysis: Value,
    trace_info: Value,
    original_filename: Option<String>,
    storage_path: Option<String>,
    storage_url: Option<String>,
    upload_source: Option<String>,
    file_format: Option<String>,
    service_file_id: Option<String>,
    avatar_url: Option<String>,
    task_token: Option<String>,
    status: String,
    review_notes: Option<String>,
    position_id: Option<i64>,
    position_name: Option<String>,
    project_id: Option<i64>,
    project_name: Option<String>,
    company_id: Option<i64>,
    company_name: Option<String>,
    promoted_resume_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// The JSONB group columns of `draft_resumes`.
#[derive(Debug)]
struct GroupColumns {
    basic_info: Value,
    contact_info: Value,
    summary: Value,
    expectations: Value,
    ai_analysis: Value,
    trace_info: Value,
}

impl GroupColumns {
    fn encode(record: &NormalizedRecord) -> Result<Self, serde_json::Error> {
        Ok(Self {
            basic_info: serde_json::to_value(&record.basic_info)?,
            contact_info: serde_json::to_value(&record.contact_info)?,
            summary: serde_json::to_value(&record.summary)?,
            expectations: serde_json::to_value(&record.expectations)?,
            ai_analysis: serde_json::to_value(&record.ai_analysis)?,
            trace_info: serde_json::to_value(&record.trace_info)?,
        })
    }
}

#[derive(Default)]
struct Children {
    work: HashMap<i64, Vec<Value>>,
    education: HashMap<i64, Vec<Value>>,
    project: HashMap<i64, Vec<Value>>,
}

impl DraftRow {
    fn into_record(self, children: &mut Children) -> DraftRecord {
        let record = NormalizedRecord {
            basic_info: decode_group(self.basic_info),
            contact_info: decode_group(self.contact_info),
            summary: decode_group(self.summary),
            expectations: decode_group(self.expectations),
            ai_analysis: decode_group(self.ai_analysis),
            trace_info: decode_group(self.trace_info),
            work_experiences: decode_entries(children.work.remove(&self.id)),
            education_experiences: decode_entries(children.education.remove(&self.id)),
            project_experiences: decode_entries(children.project.remove(&self.id)),
        };

        let linkage = self.position_id.map(|position_id| PipelineLinkage {
            position_id,
            position_name: self.position_name,
            project_id: self.project_id,
            project_name: self.project_name,
            company_id: self.company_id,
            company_name: self.company_name,
        });

        DraftRecord {
            id: self.id,
            owner_id: self.owner_id,
            record,
            provenance: Provenance {
                original_filename: self.original_filename,
                storage_path: self.storage_path,
                storage_url: self.storage_url,
                upload_source: self.upload_source,
                file_format: self.file_format,
                service_file_id: self.service_file_id,
                avatar_url: self.avatar_url,
                task_token: self.task_token,
            },
            status: DraftStatus::parse(&self.status),
            review_notes: self.review_notes,
            linkage,
            promoted_resume_id: self.promoted_resume_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn decode_group<T: DeserializeOwned + Default>(value: Value) -> T {
    if !value.is_object() {
        return T::default();
    }
    serde_json::from_value(value).unwrap_or_else(|e| {
        warn!("Stored draft group does not decode, using empty group: {e}");
        T::default()
    })
}

fn decode_entries<T: DeserializeOwned>(entries: Option<Vec<Value>>) -> Vec<T> {
    entries
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping stored draft entry that does not decode: {e}");
                None
            }
        })
        .collect()
}

async fn load_children(conn: &mut PgConnection, ids: &[i64]) -> Result<Children, sqlx::Error> {
    Ok(Children {
        work: load_entries(conn, WORK_TABLE, ids).await?,
        education: load_entries(conn, EDUCATION_TABLE, ids).await?,
        project: load_entries(conn, PROJECT_TABLE, ids).await?,
    })
}

async fn load_entries(
    conn: &mut PgConnection,
    table: &str,
    ids: &[i64],
) -> Result<HashMap<i64, Vec<Value>>, sqlx::Error> {
    let rows: Vec<(i64, Value)> = sqlx::query_as(&format!(
        "SELECT draft_id, entry FROM {table} WHERE draft_id = ANY($1) ORDER BY draft_id, ordinal"
    ))
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut grouped: HashMap<i64, Vec<Value>> = HashMap::new();
    for (draft_id, entry) in rows {
        grouped.entry(draft_id).or_default().push(entry);
    }
    Ok(grouped)
}

fn encode_entries<T: Serialize>(entries: &[T]) -> Result<Vec<Value>, serde_json::Error> {
    entries.iter().map(serde_json::to_value).collect()
}

async fn insert_entries<T: Serialize>(
    conn: &mut PgConnection,
    table: &str,
    draft_id: i64,
    entries: &[T],
) -> Result<(), DraftStoreError> {
    for (ordinal, entry) in encode_entries(entries)?.into_iter().enumerate() {
        sqlx::query(&format!(
            "INSERT INTO {table} (draft_id, ordinal, entry) VALUES ($1, $2, $3)"
        ))
        .bind(draft_id)
        .bind(ordinal as i32)
        .bind(entry)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn replace_entries(
    conn: &mut PgConnection,
    draft_id: i64,
    record: &NormalizedRecord,
) -> Result<(), DraftStoreError> {
    for table in [WORK_TABLE, EDUCATION_TABLE, PROJECT_TABLE] {
        sqlx::query(&format!("DELETE FROM {table} WHERE draft_id = $1"))
            .bind(draft_id)
            .execute(&mut *conn)
            .await?;
    }
    insert_entries(conn, WORK_TABLE, draft_id, &record.work_experiences).await?;
    insert_entries(conn, EDUCATION_TABLE, draft_id, &record.education_experiences).await?;
    insert_entries(conn, PROJECT_TABLE, draft_id, &record.project_experiences).await?;
    Ok(())
}

async fn fetch_draft(
    conn: &mut PgConnection,
    id: i64,
    owner: Uuid,
    for_update: bool,
) -> Result<DraftRecord, DraftStoreError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let row: Option<DraftRow> = sqlx::query_as(&format!(
        "SELECT {DRAFT_COLUMNS} FROM draft.draft_resumes WHERE id = $1 AND owner_id = $2{lock}"
    ))
    .bind(id)
    .bind(owner)
    .fetch_optional(&mut *conn)
    .await?;

    let row = row.ok_or(DraftStoreError::NotFound(id))?;
    let mut children = load_children(conn, &[id]).await?;
    Ok(row.into_record(&mut children))
}

#[async_trait]
impl DraftStore for PgDraftStore {
    async fn save(&self, owner: Uuid, draft: NewDraft) -> Result<i64, DraftStoreError> {
        let NewDraft {
            record,
            provenance,
            linkage,
        } = draft;
        let linkage = linkage.as_ref();
        let groups = GroupColumns::encode(&record)?;

        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO draft.draft_resumes
                (owner_id, basic_info, contact_info, summary, expectations, ai_analysis,
                 trace_info, original_filename, storage_path, storage_url, upload_source,
                 file_format, service_file_id, avatar_url, task_token, status,
                 position_id, position_name, project_id, project_name, company_id, company_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22)
            RETURNING id
            "#,
        )
        .bind(owner)
        .bind(groups.basic_info)
        .bind(groups.contact_info)
        .bind(groups.summary)
        .bind(groups.expectations)
        .bind(groups.ai_analysis)
        .bind(groups.trace_info)
        .bind(&provenance.original_filename)
        .bind(&provenance.storage_path)
        .bind(&provenance.storage_url)
        .bind(&provenance.upload_source)
        .bind(&provenance.file_format)
        .bind(&provenance.service_file_id)
        .bind(&provenance.avatar_url)
        .bind(&provenance.task_token)
        .bind(DraftStatus::PendingReview.as_str())
        .bind(linkage.map(|l| l.position_id))
        .bind(linkage.and_then(|l| l.position_name.clone()))
        .bind(linkage.and_then(|l| l.project_id))
        .bind(linkage.and_then(|l| l.project_name.clone()))
        .bind(linkage.and_then(|l| l.company_id))
        .bind(linkage.and_then(|l| l.company_name.clone()))
        .fetch_one(&mut *tx)
        .await?;

        insert_entries(&mut tx, WORK_TABLE, id, &record.work_experiences).await?;
        insert_entries(&mut tx, EDUCATION_TABLE, id, &record.education_experiences).await?;
        insert_entries(&mut tx, PROJECT_TABLE, id, &record.project_experiences).await?;

        tx.commit().await?;

        info!(
            "Staged draft {id} for {owner} ({}, {} work / {} education / {} project entries)",
            record.display_name(),
            record.work_experiences.len(),
            record.education_experiences.len(),
            record.project_experiences.len()
        );
        Ok(id)
    }

    async fn list(&self, owner: Uuid, page: Page) -> Result<DraftPage, DraftStoreError> {
        let page = page.normalized();
        let mut conn = self.pool.acquire().await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM draft.draft_resumes WHERE owner_id = $1")
                .bind(owner)
                .fetch_one(&mut *conn)
                .await?;

        let rows: Vec<DraftRow> = sqlx::query_as(&format!(
            "SELECT {DRAFT_COLUMNS} FROM draft.draft_resumes WHERE owner_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(owner)
        .bind(i64::from(page.page_size))
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await?;

        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let mut children = load_children(&mut conn, &ids).await?;
        let drafts = rows
            .into_iter()
            .map(|row| row.into_record(&mut children))
            .collect();

        Ok(DraftPage::new(drafts, total, page))
    }

    async fn get(&self, id: i64, owner: Uuid) -> Result<DraftRecord, DraftStoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_draft(&mut conn, id, owner, false).await
    }

    async fn update(
        &self,
        id: i64,
        owner: Uuid,
        patch: DraftPatch,
    ) -> Result<DraftRecord, DraftStoreError> {
        let mut tx = self.pool.begin().await?;

        let mut draft = fetch_draft(&mut tx, id, owner, true).await?;
        if draft.status == DraftStatus::Promoted {
            return Err(DraftStoreError::Invalid(format!(
                "draft {id} was already promoted to résumé {}",
                draft.promoted_resume_id.unwrap_or_default()
            )));
        }

        let replace_lists = patch.touches_lists();
        patch.apply(&mut draft)?;
        let record = &draft.record;
        let groups = GroupColumns::encode(record)?;

        let updated_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            UPDATE draft.draft_resumes
            SET basic_info = $3, contact_info = $4, summary = $5, expectations = $6,
                ai_analysis = $7, trace_info = $8, review_notes = $9, updated_at = now()
            WHERE id = $1 AND owner_id = $2
            RETURNING updated_at
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(groups.basic_info)
        .bind(groups.contact_info)
        .bind(groups.summary)
        .bind(groups.expectations)
        .bind(groups.ai_analysis)
        .bind(groups.trace_info)
        .bind(&draft.review_notes)
        .fetch_one(&mut *tx)
        .await?;

        if replace_lists {
            replace_entries(&mut tx, id, record).await?;
        }

        tx.commit().await?;
        draft.updated_at = updated_at;

        info!("Updated draft {id} for {owner}");
        Ok(draft)
    }

    async fn delete(&self, id: i64, owner: Uuid) -> Result<(), DraftStoreError> {
        let result = sqlx::query("DELETE FROM draft.draft_resumes WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DraftStoreError::NotFound(id));
        }
        info!("Deleted draft {id} for {owner}");
        Ok(())
    }

    async fn delete_many(&self, ids: &[i64], owner: Uuid) -> Result<u64, DraftStoreError> {
        let result =
            sqlx::query("DELETE FROM draft.draft_resumes WHERE owner_id = $1 AND id = ANY($2)")
                .bind(owner)
                .bind(ids)
                .execute(&self.pool)
                .await?;

        info!(
            "Deleted {} of {} requested drafts for {owner}",
            result.rows_affected(),
            ids.len()
        );
        Ok(result.rows_affected())
    }

    async fn mark_promoted(
        &self,
        id: i64,
        owner: Uuid,
        resume_id: i64,
    ) -> Result<(), DraftStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE draft.draft_resumes
            SET status = $3, promoted_resume_id = $4, updated_at = now()
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(DraftStatus::Promoted.as_str())
        .bind(resume_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DraftStoreError::NotFound(id));
        }
        Ok(())
    }
}
