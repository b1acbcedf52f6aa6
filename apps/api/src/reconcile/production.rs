use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use thiserror::Error;
use tracing::info;

use crate::reconcile::field_map::{ColumnValue, MappedRow};

#[derive(Debug, Error)]
pub enum ProductionStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A résumé ready to insert, already projected through the field map.
#[derive(Debug, Clone)]
pub struct NewProductionResume {
    pub source_draft_id: i64,
    pub fields: MappedRow,
    pub work_experiences: Vec<MappedRow>,
    pub education_experiences: Vec<MappedRow>,
    pub project_experiences: Vec<MappedRow>,
}

impl NewProductionResume {
    fn text_field(&self, name: &str) -> Option<&str> {
        self.fields.iter().find_map(|(column, value)| match value {
            ColumnValue::Text(Some(text)) if *column == name => Some(text.as_str()),
            _ => None,
        })
    }

    /// Name + phone, when both are known.
    pub fn natural_key(&self) -> Option<(&str, &str)> {
        Some((self.text_field("chinese_name")?, self.text_field("phone")?))
    }
}

/// Canonical résumé store. Carried in `AppState` as `Arc<dyn ProductionStore>`.
#[async_trait]
pub trait ProductionStore: Send + Sync {
    /// Inserts the résumé and its lists in one transaction.
    async fn insert(&self, resume: &NewProductionResume) -> Result<i64, ProductionStoreError>;

    /// Résumé previously created from `draft_id`, if any.
    async fn find_by_source_draft(&self, draft_id: i64) -> Result<Option<i64>, ProductionStoreError>;

    /// A résumé with the same name and phone that came from another draft.
    async fn find_by_natural_key(
        &self,
        name: &str,
        phone: &str,
        exclude_draft_id: i64,
    ) -> Result<Option<i64>, ProductionStoreError>;

    /// The stored résumé as JSON, with its lists.
    async fn get(&self, id: i64) -> Result<Option<Value>, ProductionStoreError>;
}

#[derive(Clone)]
pub struct PgProductionStore {
    pool: PgPool,
}

impl PgProductionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_value(values: &mut sqlx::query_builder::Separated<'_, '_, Postgres, &'static str>, value: &ColumnValue) {
    match value.clone() {
        ColumnValue::Text(v) => values.push_bind(v),
        ColumnValue::TextList(v) => values.push_bind(v),
        ColumnValue::Date(v) => values.push_bind(v),
        ColumnValue::Json(v) => values.push_bind(v),
    };
}

async fn insert_row(
    conn: &mut PgConnection,
    table: &str,
    row: &MappedRow,
    parent: (&'static str, i64),
) -> Result<i64, sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!("INSERT INTO {table} ("));
    {
        let mut columns = builder.separated(", ");
        for (name, _) in row {
            columns.push(*name);
        }
        columns.push(parent.0);
    }
    builder.push(") VALUES (");
    {
        let mut values = builder.separated(", ");
        for (_, value) in row {
            push_value(&mut values, value);
        }
        values.push_bind(parent.1);
    }
    builder.push(") RETURNING id");

    builder
        .build_query_scalar::<i64>()
        .fetch_one(&mut *conn)
        .await
}

#[async_trait]
impl ProductionStore for PgProductionStore {
    async fn insert(&self, resume: &NewProductionResume) -> Result<i64, ProductionStoreError> {
        let mut tx = self.pool.begin().await?;

        let id = insert_row(
            &mut tx,
            "public.resumes",
            &resume.fields,
            ("source_draft_id", resume.source_draft_id),
        )
        .await?;

        for (table, rows) in [
            ("public.work_experiences", &resume.work_experiences),
            ("public.education_experiences", &resume.education_experiences),
            ("public.project_experiences", &resume.project_experiences),
        ] {
            for row in rows {
                insert_row(&mut tx, table, row, ("resume_id", id)).await?;
            }
        }

        tx.commit().await?;

        info!(
            "Inserted production résumé {id} from draft {} ({} work / {} education / {} project entries)",
            resume.source_draft_id,
            resume.work_experiences.len(),
            resume.education_experiences.len(),
            resume.project_experiences.len()
        );
        Ok(id)
    }

    async fn find_by_source_draft(&self, draft_id: i64) -> Result<Option<i64>, ProductionStoreError> {
        let id = sqlx::query_scalar(
            "SELECT id FROM public.resumes WHERE source_draft_id = $1 ORDER BY id LIMIT 1",
        )
        .bind(draft_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn find_by_natural_key(
        &self,
        name: &str,
        phone: &str,
        exclude_draft_id: i64,
    ) -> Result<Option<i64>, ProductionStoreError> {
        let id = sqlx::query_scalar(
            r#"
            SELECT id FROM public.resumes
            WHERE chinese_name = $1 AND phone = $2
              AND source_draft_id IS DISTINCT FROM $3
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(name)
        .bind(phone)
        .bind(exclude_draft_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Option<Value>, ProductionStoreError> {
        let resume: Option<Value> =
            sqlx::query_scalar("SELECT to_jsonb(r) FROM public.resumes r WHERE r.id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        let Some(mut resume) = resume else {
            return Ok(None);
        };

        for (key, table) in [
            ("work_experiences", "public.work_experiences"),
            ("education_experiences", "public.education_experiences"),
            ("project_experiences", "public.project_experiences"),
        ] {
            let entries: Vec<Value> = sqlx::query_scalar(&format!(
                "SELECT to_jsonb(e) - 'resume_id' FROM {table} e WHERE e.resume_id = $1 ORDER BY e.id"
            ))
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
            resume[key] = Value::Array(entries);
        }

        Ok(Some(resume))
    }
}
