//! Explicit field mapping between the draft and production résumé schemas.
//!
//! Both sides describe themselves as named columns. Promotion copies exactly
//! the fields listed here; a listed field missing on the draft side is a
//! `SchemaDrift` error rather than a silently dropped value. The tests pin
//! the lists against the draft model and the production DDL.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::Value;

use crate::models::draft::DraftRecord;
use crate::models::resume::{EducationExperience, ProjectExperience, WorkExperience};

/// Version of the mapping tables below. Bump when a list changes.
pub const FIELD_MAP_VERSION: u32 = 1;

/// Résumé-level fields present in both schemas.
pub const RESUME_FIELDS: &[&str] = &[
    // identity
    "resume_number",
    "contact_time_preference",
    "chinese_name",
    "english_name",
    "gender",
    "birth_date",
    "native_place",
    "current_city",
    "political_status",
    "marital_status",
    "health",
    "height_cm",
    "weight_kg",
    "personality",
    // contact
    "phone",
    "email",
    "wechat",
    // career summary
    "summary_total_years",
    "summary_industries",
    "summary_roles",
    "skills",
    "awards",
    "languages",
    "highest_education",
    // expectations
    "expected_location_range_km",
    "expected_cities",
    "expected_salary_yearly",
    "expected_salary_monthly",
    "expected_industries",
    "expected_company_nature",
    "expected_company_size",
    "expected_company_stage",
    "expected_position",
    "additional_conditions",
    "job_search_status",
    // analysis
    "ai_profile",
    "ai_swot",
    "ai_career_stage",
    "ai_personality",
    // provenance
    "storage_path",
    "storage_url",
    "original_filename",
    "file_format",
    "upload_source",
    "avatar_url",
];

pub const WORK_FIELDS: &[&str] = &[
    "company_name",
    "company_intro",
    "company_size",
    "company_valuation",
    "company_type",
    "company_stage",
    "company_location",
    "start_date",
    "end_date",
    "current_status",
    "position",
    "department",
    "report_to",
    "subordinates",
    "job_description",
    "job_details",
    "achievements",
];

pub const EDUCATION_FIELDS: &[&str] = &[
    "school",
    "major",
    "degree",
    "start_date",
    "end_date",
    "main_courses",
    "certificates",
    "ranking",
];

pub const PROJECT_FIELDS: &[&str] = &[
    "project_name",
    "start_date",
    "end_date",
    "role",
    "project_intro",
    "project_achievements",
];

/// A typed column value, bound as the matching Postgres type.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(Option<String>),
    TextList(Vec<String>),
    Date(Option<NaiveDate>),
    Json(Option<Value>),
}

impl ColumnValue {
    pub fn to_json(&self) -> Value {
        match self {
            ColumnValue::Text(v) => v.clone().map(Value::String).unwrap_or(Value::Null),
            ColumnValue::TextList(v) => Value::from(v.clone()),
            ColumnValue::Date(v) => v
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null),
            ColumnValue::Json(v) => v.clone().unwrap_or(Value::Null),
        }
    }
}

pub type ColumnSet = BTreeMap<&'static str, ColumnValue>;

/// Columns in allow-list order, ready to insert.
pub type MappedRow = Vec<(&'static str, ColumnValue)>;

/// A schema that can describe itself as named columns.
pub trait Columns {
    fn columns(&self) -> ColumnSet;
}

fn text(v: &Option<String>) -> ColumnValue {
    ColumnValue::Text(v.clone())
}

fn list(v: &[String]) -> ColumnValue {
    ColumnValue::TextList(v.to_vec())
}

fn date(v: &Option<NaiveDate>) -> ColumnValue {
    ColumnValue::Date(*v)
}

impl Columns for DraftRecord {
    fn columns(&self) -> ColumnSet {
        let r = &self.record;
        let b = &r.basic_info;
        let c = &r.contact_info;
        let s = &r.summary;
        let e = &r.expectations;
        let a = &r.ai_analysis;
        let p = &self.provenance;

        let avatar = p.avatar_url.clone().or_else(|| r.trace_info.avatar_url.clone());

        ColumnSet::from([
            ("resume_number", text(&b.resume_number)),
            ("contact_time_preference", text(&b.contact_time_preference)),
            ("chinese_name", text(&b.chinese_name)),
            ("english_name", text(&b.english_name)),
            ("gender", text(&b.gender)),
            ("birth_date", date(&b.birth_date)),
            ("native_place", text(&b.native_place)),
            ("current_city", text(&b.current_city)),
            ("political_status", text(&b.political_status)),
            ("marital_status", text(&b.marital_status)),
            ("health", text(&b.health)),
            ("height_cm", text(&b.height_cm)),
            ("weight_kg", text(&b.weight_kg)),
            ("personality", text(&b.personality)),
            ("phone", text(&c.phone)),
            ("email", text(&c.email)),
            ("wechat", text(&c.wechat)),
            ("summary_total_years", text(&s.total_years)),
            ("summary_industries", list(&s.industries)),
            ("summary_roles", list(&s.roles)),
            ("skills", list(&s.skills)),
            ("awards", list(&s.awards)),
            ("languages", list(&s.languages)),
            ("highest_education", text(&s.highest_education)),
            ("expected_location_range_km", text(&e.location_range_km)),
            ("expected_cities", list(&e.cities)),
            ("expected_salary_yearly", text(&e.salary_yearly)),
            ("expected_salary_monthly", text(&e.salary_monthly)),
            ("expected_industries", list(&e.industries)),
            ("expected_company_nature", text(&e.company_nature)),
            ("expected_company_size", text(&e.company_size)),
            ("expected_company_stage", text(&e.company_stage)),
            ("expected_position", text(&e.position)),
            ("additional_conditions", text(&e.additional_conditions)),
            ("job_search_status", text(&e.job_search_status)),
            ("ai_profile", text(&a.profile)),
            ("ai_swot", ColumnValue::Json(a.swot.clone())),
            ("ai_career_stage", text(&a.career_stage)),
            ("ai_personality", text(&a.personality)),
            ("storage_path", text(&p.storage_path)),
            ("storage_url", text(&p.storage_url)),
            ("original_filename", text(&p.original_filename)),
            ("file_format", text(&p.file_format)),
            ("upload_source", text(&p.upload_source)),
            ("avatar_url", ColumnValue::Text(avatar)),
            // draft-only, never promoted
            ("service_file_id", text(&p.service_file_id)),
            ("task_token", text(&p.task_token)),
            ("review_notes", text(&self.review_notes)),
            ("status", ColumnValue::Text(Some(self.status.as_str().to_string()))),
        ])
    }
}

impl Columns for WorkExperience {
    fn columns(&self) -> ColumnSet {
        ColumnSet::from([
            ("company_name", text(&self.company_name)),
            ("company_intro", text(&self.company_intro)),
            ("company_size", text(&self.company_size)),
            ("company_valuation", text(&self.company_valuation)),
            ("company_type", text(&self.company_type)),
            ("company_stage", text(&self.company_stage)),
            ("company_location", text(&self.company_location)),
            ("start_date", date(&self.start_date)),
            ("end_date", date(&self.end_date)),
            ("current_status", text(&self.current_status)),
            ("position", text(&self.position)),
            ("department", text(&self.department)),
            ("report_to", text(&self.report_to)),
            ("subordinates", text(&self.subordinates)),
            ("job_description", text(&self.job_description)),
            ("job_details", list(&self.job_details)),
            ("achievements", list(&self.achievements)),
        ])
    }
}

impl Columns for EducationExperience {
    fn columns(&self) -> ColumnSet {
        ColumnSet::from([
            ("school", text(&self.school)),
            ("major", text(&self.major)),
            ("degree", text(&self.degree)),
            ("start_date", date(&self.start_date)),
            ("end_date", date(&self.end_date)),
            ("main_courses", list(&self.main_courses)),
            ("certificates", list(&self.certificates)),
            ("ranking", text(&self.ranking)),
        ])
    }
}

impl Columns for ProjectExperience {
    fn columns(&self) -> ColumnSet {
        ColumnSet::from([
            ("project_name", text(&self.project_name)),
            ("start_date", date(&self.start_date)),
            ("end_date", date(&self.end_date)),
            ("role", text(&self.role)),
            ("project_intro", text(&self.project_intro)),
            ("project_achievements", text(&self.project_achievements)),
        ])
    }
}

/// Copies the allow-listed fields out of `source`, in allow-list order.
/// Returns the first listed field the source does not provide.
pub fn project<T: Columns>(source: &T, fields: &[&'static str]) -> Result<MappedRow, &'static str> {
    let mut columns = source.columns();
    fields
        .iter()
        .map(|field| {
            columns
                .remove(field)
                .map(|value| (*field, value))
                .ok_or(*field)
        })
        .collect()
}
