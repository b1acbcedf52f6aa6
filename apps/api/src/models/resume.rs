use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::lenient;

/// The structured form of one résumé, as produced by the extraction service
/// (or submitted directly) and edited during review.
///
/// Every field decodes leniently: dates are valid or absent, lists are never
/// null, scalars the model emitted as numbers are kept as text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    #[serde(default, deserialize_with = "lenient::group")]
    pub basic_info: BasicInfo,
    #[serde(default, deserialize_with = "lenient::group")]
    pub contact_info: ContactInfo,
    #[serde(default, deserialize_with = "lenient::group")]
    pub summary: CareerSummary,
    #[serde(default, deserialize_with = "lenient::group")]
    pub expectations: Expectations,
    #[serde(default, deserialize_with = "lenient::group")]
    pub ai_analysis: AiAnalysis,
    #[serde(default, deserialize_with = "lenient::entries")]
    pub work_experiences: Vec<WorkExperience>,
    #[serde(default, deserialize_with = "lenient::entries")]
    pub education_experiences: Vec<EducationExperience>,
    #[serde(default, deserialize_with = "lenient::entries")]
    pub project_experiences: Vec<ProjectExperience>,
    #[serde(default, deserialize_with = "lenient::group")]
    pub trace_info: TraceInfo,
}

impl NormalizedRecord {
    /// Decodes a model-produced object, hoisting the alternative layouts the
    /// model is known to emit before the lenient field decoding runs.
    pub fn from_model_output(mut value: Value) -> Result<Self, serde_json::Error> {
        if let Some(entries) = value
            .get_mut("work_experiences")
            .and_then(Value::as_array_mut)
        {
            for entry in entries.iter_mut() {
                hoist_company_info(entry);
            }
        }
        serde_json::from_value(value)
    }

    /// Display name used in logs and list views.
    pub fn display_name(&self) -> &str {
        self.basic_info
            .chinese_name
            .as_deref()
            .or(self.basic_info.english_name.as_deref())
            .unwrap_or("<unnamed>")
    }
}

/// `{"company_info": {"name": .., "size": ..}}` → `company_name`, `company_size`.
/// A flat key that is missing or null takes the hoisted value.
fn hoist_company_info(entry: &mut Value) {
    let Some(object) = entry.as_object_mut() else {
        return;
    };
    let Some(Value::Object(info)) = object.remove("company_info") else {
        return;
    };
    for (key, value) in info {
        let slot = object.entry(format!("company_{key}")).or_insert(Value::Null);
        if slot.is_null() {
            *slot = value;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    #[serde(default, deserialize_with = "lenient::text")]
    pub resume_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub contact_time_preference: Option<String>,
    #[serde(default, alias = "name", deserialize_with = "lenient::text")]
    pub chinese_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub english_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "lenient::date")]
    pub birth_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub native_place: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub current_city: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub political_status: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub marital_status: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub health: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub height_cm: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub weight_kg: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub personality: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default, deserialize_with = "lenient::text")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub wechat: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CareerSummary {
    #[serde(default, alias = "work_years", deserialize_with = "lenient::text")]
    pub total_years: Option<String>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub industries: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub roles: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub skills: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub awards: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub languages: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub highest_education: Option<String>,
}

/// Compensation and placement expectations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Expectations {
    #[serde(default, deserialize_with = "lenient::text")]
    pub location_range_km: Option<String>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub cities: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub salary_yearly: Option<String>,
    #[serde(default, alias = "expected_salary", deserialize_with = "lenient::text")]
    pub salary_monthly: Option<String>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub industries: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub company_nature: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub company_size: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub company_stage: Option<String>,
    #[serde(default, alias = "expected_position", deserialize_with = "lenient::text")]
    pub position: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub additional_conditions: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub job_search_status: Option<String>,
}

/// Model-generated assessment of the candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysis {
    #[serde(default, alias = "ai_profile", deserialize_with = "lenient::text")]
    pub profile: Option<String>,
    #[serde(default, alias = "ai_swot", deserialize_with = "lenient::json")]
    pub swot: Option<Value>,
    #[serde(default, alias = "ai_career_stage", deserialize_with = "lenient::text")]
    pub career_stage: Option<String>,
    #[serde(default, alias = "ai_personality", deserialize_with = "lenient::text")]
    pub personality: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceInfo {
    #[serde(default, deserialize_with = "lenient::text")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkExperience {
    #[serde(default, alias = "company", deserialize_with = "lenient::text")]
    pub company_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub company_intro: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub company_size: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub company_valuation: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub company_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub company_stage: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub company_location: Option<String>,
    #[serde(default, deserialize_with = "lenient::date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::date")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub current_status: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub position: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub department: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub report_to: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub subordinates: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub job_description: Option<String>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub job_details: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub achievements: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducationExperience {
    #[serde(default, alias = "school_name", deserialize_with = "lenient::text")]
    pub school: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub major: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub degree: Option<String>,
    #[serde(default, deserialize_with = "lenient::date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::date")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub main_courses: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub certificates: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub ranking: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectExperience {
    #[serde(default, deserialize_with = "lenient::text")]
    pub project_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient::date")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::date")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, alias = "project_description", deserialize_with = "lenient::text")]
    pub project_intro: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub project_achievements: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_output_with_prompt_field_names_decodes() {
        let value = json!({
            "basic_info": {"name": "张三", "gender": "男", "birth_date": "1990年01月01日", "age": "34"},
            "contact_info": {"phone": 13800138000u64, "email": "zhangsan@example.com"},
            "summary": {"work_years": 5, "skills": "Rust", "languages": ["英语: 流利"]},
            "expectations": {"expected_position": "高级工程师", "expected_salary": "25k"},
            "work_experiences": [{
                "company_name": "某互联网公司",
                "position": "工程师",
                "start_date": "2020.03",
                "end_date": "至今",
                "job_description": "负责核心架构"
            }],
            "education_experiences": [{"school_name": "某大学", "degree": "本科"}],
            "project_experiences": null,
            "ai_analysis": {"ai_profile": "资深工程师", "ai_swot": {"strengths": ["扎实"]}}
        });

        let record = NormalizedRecord::from_model_output(value).unwrap();
        assert_eq!(record.basic_info.chinese_name.as_deref(), Some("张三"));
        assert_eq!(
            record.basic_info.birth_date,
            NaiveDate::from_ymd_opt(1990, 1, 1)
        );
        assert_eq!(record.contact_info.phone.as_deref(), Some("13800138000"));
        assert_eq!(record.summary.total_years.as_deref(), Some("5"));
        assert_eq!(record.summary.skills, vec!["Rust"]);
        assert_eq!(record.expectations.position.as_deref(), Some("高级工程师"));
        assert_eq!(record.expectations.salary_monthly.as_deref(), Some("25k"));
        assert_eq!(record.work_experiences.len(), 1);
        assert_eq!(
            record.work_experiences[0].start_date,
            NaiveDate::from_ymd_opt(2020, 3, 1)
        );
        assert_eq!(record.work_experiences[0].end_date, None);
        assert_eq!(record.education_experiences[0].school.as_deref(), Some("某大学"));
        assert!(record.project_experiences.is_empty());
        assert_eq!(record.ai_analysis.profile.as_deref(), Some("资深工程师"));
        assert!(record.ai_analysis.swot.is_some());
    }

    #[test]
    fn test_null_groups_fall_back_to_empty() {
        let value = json!({"basic_info": null, "summary": "n/a", "work_experiences": "none"});
        let record = NormalizedRecord::from_model_output(value).unwrap();
        assert_eq!(record, NormalizedRecord::default());
    }

    #[test]
    fn test_company_info_is_hoisted() {
        let value = json!({
            "work_experiences": [{
                "company_info": {"name": "某公司", "size": "500-1000人", "location": "上海"},
                "company_name": null,
                "position": "前端"
            }]
        });
        let record = NormalizedRecord::from_model_output(value).unwrap();
        let work = &record.work_experiences[0];
        assert_eq!(work.company_name.as_deref(), Some("某公司"));
        assert_eq!(work.company_size.as_deref(), Some("500-1000人"));
        assert_eq!(work.company_location.as_deref(), Some("上海"));
    }

    #[test]
    fn test_flat_company_name_beats_company_info() {
        let value = json!({
            "work_experiences": [
                {"company_info": {"name": "某公司"}, "company_name": null},
                {"company_info": {"name": "旧名"}, "company_name": "新名"}
            ]
        });
        let record = NormalizedRecord::from_model_output(value).unwrap();
        assert_eq!(record.work_experiences[0].company_name.as_deref(), Some("某公司"));
        assert_eq!(record.work_experiences[1].company_name.as_deref(), Some("新名"));
    }

    #[test]
    fn test_serialized_record_decodes_to_itself() {
        let mut record = NormalizedRecord::default();
        record.basic_info.chinese_name = Some("李四".to_string());
        record.basic_info.birth_date = NaiveDate::from_ymd_opt(1992, 5, 17);
        record.summary.skills = vec!["Go".to_string(), "SQL".to_string()];
        record.ai_analysis.swot = Some(json!("优势：执行力强"));
        record.project_experiences.push(ProjectExperience {
            project_name: Some("结算系统".to_string()),
            start_date: NaiveDate::from_ymd_opt(2022, 1, 1),
            ..Default::default()
        });

        let value = serde_json::to_value(&record).unwrap();
        let decoded: NormalizedRecord = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_display_name_falls_back_to_english_name() {
        let mut record = NormalizedRecord::default();
        assert_eq!(record.display_name(), "<unnamed>");
        record.basic_info.english_name = Some("Li Si".to_string());
        assert_eq!(record.display_name(), "Li Si");
    }
}
