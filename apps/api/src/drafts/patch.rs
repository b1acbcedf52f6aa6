use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::drafts::DraftStoreError;
use crate::models::draft::DraftRecord;
use crate::models::lenient::parse_date;

/// A review edit. Groups are merged key by key; lists, when present,
/// replace the stored list as a whole.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DraftPatch {
    pub basic_info: Option<Map<String, Value>>,
    pub contact_info: Option<Map<String, Value>>,
    pub summary: Option<Map<String, Value>>,
    pub expectations: Option<Map<String, Value>>,
    pub ai_analysis: Option<Map<String, Value>>,
    pub trace_info: Option<Map<String, Value>>,
    pub work_experiences: Option<Vec<Value>>,
    pub education_experiences: Option<Vec<Value>>,
    pub project_experiences: Option<Vec<Value>>,
    pub review_notes: Option<String>,
}

impl DraftPatch {
    pub fn touches_lists(&self) -> bool {
        self.work_experiences.is_some()
            || self.education_experiences.is_some()
            || self.project_experiences.is_some()
    }

    /// Applies the patch to an in-memory draft.
    pub fn apply(self, draft: &mut DraftRecord) -> Result<(), DraftStoreError> {
        let record = &mut draft.record;

        if let Some(fields) = self.basic_info {
            record.basic_info = merge_group(&record.basic_info, fields, "basic_info")?;
        }
        if let Some(fields) = self.contact_info {
            record.contact_info = merge_group(&record.contact_info, fields, "contact_info")?;
        }
        if let Some(fields) = self.summary {
            record.summary = merge_group(&record.summary, fields, "summary")?;
        }
        if let Some(fields) = self.expectations {
            record.expectations = merge_group(&record.expectations, fields, "expectations")?;
        }
        if let Some(fields) = self.ai_analysis {
            record.ai_analysis = merge_group(&record.ai_analysis, fields, "ai_analysis")?;
        }
        if let Some(fields) = self.trace_info {
            record.trace_info = merge_group(&record.trace_info, fields, "trace_info")?;
        }

        if let Some(entries) = self.work_experiences {
            record.work_experiences = replace_list(entries, "work_experiences")?;
        }
        if let Some(entries) = self.education_experiences {
            record.education_experiences = replace_list(entries, "education_experiences")?;
        }
        if let Some(entries) = self.project_experiences {
            record.project_experiences = replace_list(entries, "project_experiences")?;
        }

        if let Some(notes) = self.review_notes {
            let notes = notes.trim();
            draft.review_notes = (!notes.is_empty()).then(|| notes.to_string());
        }
        Ok(())
    }
}

/// Overwrites the known keys of a group. Unknown keys are ignored, and a
/// date that does not parse keeps the previous value.
fn merge_group<T>(current: &T, fields: Map<String, Value>, group: &str) -> Result<T, DraftStoreError>
where
    T: Serialize + DeserializeOwned,
{
    let Value::Object(mut merged) = serde_json::to_value(current)? else {
        return Err(DraftStoreError::Invalid(format!("{group} is not an object")));
    };

    for (key, value) in fields {
        if !merged.contains_key(&key) {
            debug!("Ignoring unknown field {group}.{key}");
            continue;
        }
        if key.ends_with("_date") {
            if let Value::String(raw) = &value {
                if !raw.trim().is_empty() && parse_date(raw).is_none() {
                    warn!("Ignoring unparseable date {group}.{key} = {raw:?}");
                    continue;
                }
            }
        }
        merged.insert(key, value);
    }

    Ok(serde_json::from_value(Value::Object(merged))?)
}

fn replace_list<T: DeserializeOwned>(entries: Vec<Value>, list: &str) -> Result<Vec<T>, DraftStoreError> {
    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            if !entry.is_object() {
                return Err(DraftStoreError::Invalid(format!("{list}[{i}] must be an object")));
            }
            serde_json::from_value(entry)
                .map_err(|e| DraftStoreError::Invalid(format!("{list}[{i}]: {e}")))
        })
        .collect()
}
