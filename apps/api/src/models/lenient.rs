//! Tolerant serde helpers for model-produced JSON.
//!
//! The extraction service is told which layout to emit, but it routinely
//! returns numbers where text is expected, `null` for lists, single strings
//! instead of arrays and dates in whatever notation the résumé used. These
//! helpers fold all of that into the canonical shapes: text or absent,
//! lists never null, dates valid or absent.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

const DAY_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y年%m月%d日"];

/// Parses a résumé date. Month-precision values land on the first of the month.
/// Anything unrecognised ("present", "至今", free text) is `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for format in DAY_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }

    // ISO timestamps: keep the calendar part
    if raw.len() > 10 && raw.is_char_boundary(10) {
        if let Ok(date) = NaiveDate::parse_from_str(&raw[..10], "%Y-%m-%d") {
            return Some(date);
        }
    }

    parse_month(raw)
}

fn parse_month(raw: &str) -> Option<NaiveDate> {
    let (year, month) = if let Some(rest) = raw.strip_suffix('月') {
        rest.split_once('年')?
    } else {
        ['-', '/', '.']
            .iter()
            .find_map(|sep| raw.split_once(*sep))?
    };
    let year: i32 = year.trim().parse().ok()?;
    let month: u32 = month.trim().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Renders a scalar as text. Empty strings and `null` are absent.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(value_to_text).collect();
            (!parts.is_empty()).then(|| parts.join("\n"))
        }
        Value::Object(_) => Some(value.to_string()),
    }
}

pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_text(&value))
}

pub fn text_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items.iter().filter_map(value_to_text).collect(),
        other => value_to_text(&other).into_iter().collect(),
    })
}

pub fn date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => parse_date(&s),
        _ => None,
    })
}

/// A nested group (`basic_info`, `summary`, ...). Missing, `null` or
/// non-object values fall back to the empty group.
pub fn group<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Object(_) => serde_json::from_value(value).map_err(serde::de::Error::custom),
        _ => Ok(T::default()),
    }
}

/// An ordered list of entries. Elements that are not objects are dropped.
pub fn entries<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    let Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Dropping undecodable list entry: {e}");
                None
            }
        })
        .collect())
}

/// Opaque JSON (the SWOT analysis). `null` and empty strings are absent.
pub fn json<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        Value::String(ref s) if s.trim().is_empty() => None,
        other => Some(other),
    })
}
