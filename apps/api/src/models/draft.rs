use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::resume::NormalizedRecord;

/// Review state of a staged résumé.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    PendingReview,
    Promoted,
}

impl DraftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftStatus::PendingReview => "pending_review",
            DraftStatus::Promoted => "promoted",
        }
    }

    /// Unknown values read back from storage are treated as pending.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "promoted" => DraftStatus::Promoted,
            _ => DraftStatus::PendingReview,
        }
    }
}

/// Where a draft came from. Storage URLs are recorded as handed over by the
/// object store and never re-derived.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub original_filename: Option<String>,
    pub storage_path: Option<String>,
    pub storage_url: Option<String>,
    /// `web_upload`, `structured_json` or `agent_task`.
    pub upload_source: Option<String>,
    pub file_format: Option<String>,
    /// Handle issued by the extraction service.
    pub service_file_id: Option<String>,
    pub avatar_url: Option<String>,
    pub task_token: Option<String>,
}

/// Recruiting-pipeline metadata attached to a draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineLinkage {
    pub position_id: i64,
    pub position_name: Option<String>,
    pub project_id: Option<i64>,
    pub project_name: Option<String>,
    pub company_id: Option<i64>,
    pub company_name: Option<String>,
}

/// A staged résumé awaiting review by its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftRecord {
    pub id: i64,
    pub owner_id: Uuid,
    pub record: NormalizedRecord,
    pub provenance: Provenance,
    pub status: DraftStatus,
    pub review_notes: Option<String>,
    pub linkage: Option<PipelineLinkage>,
    pub promoted_resume_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to stage a new draft.
#[derive(Debug, Clone, Default)]
pub struct NewDraft {
    pub record: NormalizedRecord,
    pub provenance: Provenance,
    pub linkage: Option<PipelineLinkage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_string_round_trip() {
        for status in [DraftStatus::PendingReview, DraftStatus::Promoted] {
            assert_eq!(DraftStatus::parse(status.as_str()), status);
        }
        assert_eq!(DraftStatus::parse("archived"), DraftStatus::PendingReview);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let value = serde_json::to_value(DraftStatus::PendingReview).unwrap();
        assert_eq!(value, serde_json::json!("pending_review"));
    }
}
