use chrono::Utc;
use serde_json::Value;

use crate::models::draft::{NewDraft, PipelineLinkage, Provenance};
use crate::models::resume::NormalizedRecord;
use crate::normalizer::liepin;
use crate::storage::ArchivedDocument;

/// Channel a draft arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadSource {
    /// Document uploaded by a reviewer and run through the normalizer.
    WebUpload,
    /// Structured JSON posted directly.
    StructuredJson,
    /// Structured JSON delivered by an automation agent under a task token.
    AgentTask,
}

impl UploadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadSource::WebUpload => "web_upload",
            UploadSource::StructuredJson => "structured_json",
            UploadSource::AgentTask => "agent_task",
        }
    }

}

/// Layout of a directly submitted résumé.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmissionFormat {
    /// The normalized group layout.
    #[default]
    Standard,
    /// Section-keyed export of the Liepin browser plugin.
    LiepinPlugin,
}

/// A decoded submission and the layout it arrived in.
#[derive(Debug, Clone)]
pub struct Submission {
    pub record: NormalizedRecord,
    pub format: SubmissionFormat,
}

/// What is known about a submission besides its content.
#[derive(Debug, Clone)]
pub struct IntakeContext {
    pub source: UploadSource,
    pub format: SubmissionFormat,
    pub original_filename: Option<String>,
    pub archived: Option<ArchivedDocument>,
    pub service_file_id: Option<String>,
    pub task_token: Option<String>,
    pub linkage: Option<PipelineLinkage>,
}

impl IntakeContext {
    fn file_format(&self) -> &'static str {
        match (self.source, self.format) {
            (UploadSource::WebUpload, _) => "llm_standardized",
            (_, SubmissionFormat::Standard) => "structured_json",
            (_, SubmissionFormat::LiepinPlugin) => "liepin_plugin",
        }
    }

    pub fn new(source: UploadSource) -> Self {
        Self {
            source,
            format: SubmissionFormat::Standard,
            original_filename: None,
            archived: None,
            service_file_id: None,
            task_token: None,
            linkage: None,
        }
    }
}

/// Decodes a directly submitted résumé: a Liepin plugin export, or an object
/// in the normalized layout read with the same leniency as model output.
pub fn record_from_submission(value: Value) -> Result<Submission, String> {
    if liepin::is_plugin_export(&value) {
        return Ok(Submission {
            record: liepin::map_plugin_export(&value, Utc::now().date_naive()),
            format: SubmissionFormat::LiepinPlugin,
        });
    }
    if !value.is_object() {
        return Err("résumé must be a JSON object or a Liepin plugin export".to_string());
    }
    let record = NormalizedRecord::from_model_output(value).map_err(|e| e.to_string())?;
    Ok(Submission {
        record,
        format: SubmissionFormat::Standard,
    })
}

/// Combines a normalized record with its provenance into a draft to stage.
pub fn build_draft(record: NormalizedRecord, ctx: IntakeContext) -> NewDraft {
    let file_format = ctx.file_format();
    let (storage_path, storage_url) = match ctx.archived {
        Some(doc) => (Some(doc.path), Some(doc.url)),
        None => (None, None),
    };

    let provenance = Provenance {
        original_filename: ctx.original_filename,
        storage_path,
        storage_url,
        upload_source: Some(ctx.source.as_str().to_string()),
        file_format: Some(file_format.to_string()),
        service_file_id: ctx.service_file_id,
        avatar_url: record.trace_info.avatar_url.clone(),
        task_token: ctx.task_token,
    };

    NewDraft {
        record,
        provenance,
        linkage: ctx.linkage,
    }
}
