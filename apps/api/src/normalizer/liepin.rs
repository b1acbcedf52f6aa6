//! Résumés exported by the Liepin browser plugin.
//!
//! The plugin posts a one-element array whose object is keyed by numbered
//! Chinese section titles (`"1.基本信息"`, `"3.工作经历"`, ...). Sections map
//! onto the normalized groups field by field; anything unlisted is dropped.

use chrono::{Datelike, NaiveDate};
use serde_json::{Map, Value};

use crate::models::lenient::{parse_date, value_to_text};
use crate::models::resume::{EducationExperience, NormalizedRecord, ProjectExperience, WorkExperience};

const SECTION_KEYS: &[&str] = &[
    "0.总体信息",
    "1.基本信息",
    "2.求职意向",
    "3.工作经历",
    "4.项目经历",
    "5.教育经历",
];

const ONGOING: &str = "至今";

/// True for a plugin export: an array whose first element carries at least
/// one of the numbered section keys.
pub fn is_plugin_export(value: &Value) -> bool {
    value
        .as_array()
        .and_then(|items| items.first())
        .and_then(Value::as_object)
        .is_some_and(|first| SECTION_KEYS.iter().any(|key| first.contains_key(*key)))
}

/// Maps a plugin export onto a normalized record. `today` anchors the birth
/// year estimated from an age such as `"32岁"`.
pub fn map_plugin_export(value: &Value, today: NaiveDate) -> NormalizedRecord {
    let empty = Map::new();
    let data = value
        .as_array()
        .and_then(|items| items.first())
        .unwrap_or(value)
        .as_object()
        .unwrap_or(&empty);

    let mut record = NormalizedRecord::default();

    let basic = section(data, "1.基本信息");
    record.basic_info.chinese_name = section_text(basic, "姓名");
    record.basic_info.gender = section_text(basic, "性别");
    record.basic_info.birth_date = section_text(basic, "年龄")
        .and_then(|age| age.strip_suffix('岁').map(str::to_string))
        .and_then(|age| age.trim().parse::<i32>().ok())
        .and_then(|age| NaiveDate::from_ymd_opt(today.year() - age, 1, 1));
    record.basic_info.current_city = section_text(basic, "地区");
    record.basic_info.contact_time_preference = section_text(basic, "方便联系时间");
    record.summary.total_years = section_text(basic, "工作年限")
        .and_then(|years| years.strip_suffix('年').map(str::to_string))
        .filter(|years| years.trim().parse::<u32>().is_ok());

    let intention = section(data, "2.求职意向");
    record.expectations.position =
        section_text(basic, "职位").or_else(|| section_text(intention, "期望职位"));
    record.expectations.cities = section_text(intention, "期望地区").into_iter().collect();
    record.expectations.salary_monthly = section_text(intention, "期望薪资");

    record.summary.skills = match data.get("8.技能") {
        Some(Value::Array(items)) => items.iter().filter_map(value_to_text).collect(),
        Some(other) => value_to_text(other).into_iter().collect(),
        None => Vec::new(),
    };
    record.summary.languages = entries(data, "7.语言能力")
        .iter()
        .filter_map(|entry| match entry {
            Value::Object(lang) => {
                let name = text(lang, "语言")?;
                Some(format!("{name}: {}", text(lang, "水平").unwrap_or_default()))
            }
            other => value_to_text(other),
        })
        .collect();

    record.ai_analysis.profile = data.get("9.自我评价").and_then(value_to_text);

    let general = section(data, "0.总体信息");
    record.trace_info.avatar_url = section_text(general, "头像");
    record.basic_info.resume_number = section_text(general, "简历编号");

    record.work_experiences = objects(data, "3.工作经历").map(work_entry).collect();
    record.education_experiences = objects(data, "5.教育经历").map(education_entry).collect();
    record.project_experiences = objects(data, "4.项目经历").map(project_entry).collect();

    record
}

fn work_entry(work: &Map<String, Value>) -> WorkExperience {
    let mut entry = WorkExperience {
        company_name: text(work, "公司名称"),
        position: text(work, "职位名称"),
        department: text(work, "所在部门"),
        report_to: text(work, "汇报对象"),
        subordinates: text(work, "下属人数"),
        job_description: text(work, "职责业绩"),
        company_location: text(work, "工作地点"),
        company_intro: text(work, "公司介绍"),
        company_type: text(work, "企业信息"),
        company_stage: text(work, "所属行业"),
        ..Default::default()
    };
    if let Some((start, end)) = text(work, "工作时间").as_deref().and_then(split_period) {
        entry.start_date = parse_date(start);
        entry.end_date = parse_date(end);
        entry.current_status = Some(if end == ONGOING { "在职" } else { "离职" }.to_string());
    }
    entry
}

fn education_entry(education: &Map<String, Value>) -> EducationExperience {
    let mut entry = EducationExperience {
        school: text(education, "学校名称"),
        major: text(education, "专业名称"),
        degree: text(education, "学位"),
        ..Default::default()
    };
    if let Some((start, end)) = text(education, "就读时间").as_deref().and_then(split_period) {
        entry.start_date = parse_date(start);
        entry.end_date = parse_date(end);
    }
    entry
}

fn project_entry(project: &Map<String, Value>) -> ProjectExperience {
    let mut entry = ProjectExperience {
        project_name: text(project, "项目名称"),
        role: text(project, "项目职务"),
        project_intro: text(project, "项目描述"),
        project_achievements: text(project, "项目业绩"),
        ..Default::default()
    };
    if let Some((start, end)) = text(project, "项目时间").as_deref().and_then(split_period) {
        entry.start_date = parse_date(start);
        entry.end_date = parse_date(end);
    }
    entry
}

/// `"2020.03-至今"` → `("2020.03", "至今")`.
fn split_period(raw: &str) -> Option<(&str, &str)> {
    let mut parts = raw.split('-');
    let start = parts.next()?.trim();
    let end = parts.next()?.trim();
    Some((start, end))
}

fn section<'a>(data: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    data.get(key).and_then(Value::as_object)
}

fn section_text(section: Option<&Map<String, Value>>, key: &str) -> Option<String> {
    section.and_then(|object| text(object, key))
}

fn entries<'a>(data: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    data.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn objects<'a>(
    data: &'a Map<String, Value>,
    key: &str,
) -> impl Iterator<Item = &'a Map<String, Value>> {
    entries(data, key).iter().filter_map(Value::as_object)
}

fn text(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(value_to_text)
}
