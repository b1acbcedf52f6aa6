//! Recovery of one JSON object from model output.
//!
//! Responses from the extraction service are usually valid JSON, but long
//! ones get cut off mid-literal and some arrive wrapped in prose or with a
//! comma missing between properties. Repair is a fixed pipeline applied to a
//! candidate slice of the response:
//!
//! 1. quote balance (close a string literal left open by truncation)
//! 2. comma insertion (between adjacent literals / a value and the next key)
//! 3. structural balance (drop a dangling `,`, complete a dangling `:`,
//!    close brackets left open)
//!
//! If no repaired candidate decodes, the plain `{ .. }` span is tried once
//! as-is before giving up.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
#[error("malformed model output: {reason}")]
pub struct MalformedOutput {
    pub reason: String,
    pub original: String,
    pub repaired: Option<String>,
}

/// Returns the JSON object contained in `raw`, repairing it if needed.
pub fn parse_model_output(raw: &str) -> Result<Value, MalformedOutput> {
    let text = raw.trim_start_matches('\u{feff}').trim();

    let (start, end) = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => (start, end),
        _ => {
            return Err(MalformedOutput {
                reason: "no JSON object present".to_string(),
                original: raw.to_string(),
                repaired: None,
            })
        }
    };

    let span = &text[start..=end];
    let tail = &text[start..];

    // Text running past the last `}` is usually a literal cut off by the
    // length limit, so the whole tail is the first candidate.
    let mut candidates = Vec::with_capacity(2);
    if tail.len() > span.len() {
        candidates.push(tail);
    }
    candidates.push(span);

    let mut last_repaired = None;
    let mut last_error = String::new();
    for candidate in candidates {
        let repaired = repair(candidate);
        match decode_object(&repaired) {
            Ok(value) => {
                if repaired != candidate {
                    debug!(
                        "Repaired model output ({} -> {} bytes)",
                        candidate.len(),
                        repaired.len()
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                last_error = e;
                last_repaired = Some(repaired);
            }
        }
    }

    decode_object(span).map_err(|e| MalformedOutput {
        reason: format!("{last_error}; unrepaired span: {e}"),
        original: raw.to_string(),
        repaired: last_repaired,
    })
}

fn repair(candidate: &str) -> String {
    let balanced = balance_quotes(candidate);
    let separated = insert_missing_commas(&balanced);
    close_open_brackets(&separated)
}

fn decode_object(text: &str) -> Result<Value, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) if value.is_object() => Ok(value),
        Ok(_) => Err("decoded value is not an object".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

#[derive(Debug, Default)]
pub(crate) struct QuoteScan {
    pub doubles: usize,
    pub singles: usize,
    pub dangling_escape: bool,
}

/// Counts unescaped double quotes, and single quotes outside double-quoted
/// strings.
pub(crate) fn scan_quotes(text: &str) -> QuoteScan {
    let mut scan = QuoteScan::default();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => {
                scan.doubles += 1;
                in_string = !in_string;
            }
            '\'' if !in_string => scan.singles += 1,
            _ => {}
        }
    }

    scan.dangling_escape = escaped;
    scan
}

pub(crate) fn balance_quotes(text: &str) -> String {
    let scan = scan_quotes(text);
    let mut out = text.to_string();

    if scan.doubles % 2 == 1 {
        // a trailing lone backslash would escape the closing quote
        if scan.dangling_escape {
            out.pop();
        }
        out.push('"');
    }
    if scan.singles % 2 == 1 {
        out.push('\'');
    }
    out
}

/// Inserts a comma before a string literal that directly follows another
/// value: `"x" "y"` in arrays, `"v" "key":` / `1 "key":` / `} "key":` in
/// objects.
pub(crate) fn insert_missing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut escaped = false;
    let mut prev: Option<char> = None;

    for c in text.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                prev = Some('"');
            }
            continue;
        }

        if c == '"' {
            let follows_value = matches!(
                prev,
                Some(p) if p == '"' || p == '}' || p == ']' || p.is_ascii_alphanumeric()
            );
            if follows_value {
                out.push(',');
            }
            in_string = true;
        }
        if !c.is_whitespace() {
            prev = Some(c);
        }
        out.push(c);
    }

    out
}

pub(crate) fn close_open_brackets(text: &str) -> String {
    let mut open = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => open.push('}'),
            '[' => open.push(']'),
            '}' | ']' => {
                if open.last() == Some(&c) {
                    open.pop();
                }
            }
            _ => {}
        }
    }

    if open.is_empty() || in_string {
        return text.to_string();
    }

    let mut out = text.trim_end().to_string();
    while out.ends_with(',') {
        out.pop();
        out.truncate(out.trim_end().len());
    }
    if out.ends_with(':') {
        out.push_str(" null");
    }
    while let Some(closer) = open.pop() {
        out.push(closer);
    }
    out
}
