//! Parsing of raw model replies into structured data plus grounding.
//!
//! Providers do not reliably honor the output contract: free-text models wrap
//! the JSON in prose or markdown fences, some ignore the `structured_data`
//! key, and layout entries come back with missing or short boxes. Recovery is
//! field-level only; if no JSON can be found at all the whole parse fails.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::provider::ResponseMode;

/// One grounded text region. `box_2d` is `[ymin, xmin, ymax, xmax]` on a
/// 0-1000 scale, as emitted by the model (not necessarily ordered).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutItem {
    pub text: String,
    pub box_2d: [i64; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedPayload {
    pub structured_data: Value,
    pub layout: Vec<LayoutItem>,
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").expect("static regex"))
}

/// Parse a raw reply. JSON-mode replies may still arrive inside a markdown
/// fence, which is unwrapped; only free-text replies get prose stripped.
pub fn parse(raw: &str, mode: ResponseMode) -> Result<ParsedPayload, PipelineError> {
    let value = match mode {
        ResponseMode::JsonMode => parse_json_mode(raw)?,
        ResponseMode::FreeText => parse_free_text(raw)?,
    };

    Ok(split_payload(value))
}

fn fenced(text: &str) -> Option<&str> {
    fence_regex()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|inner| inner.as_str().trim())
}

fn parse_json_mode(raw: &str) -> Result<Value, PipelineError> {
    let trimmed = raw.trim();
    serde_json::from_str::<Value>(trimmed)
        .or_else(|e| match fenced(trimmed) {
            Some(inner) if trimmed.starts_with("```") => serde_json::from_str(inner).map_err(|_| e),
            _ => Err(e),
        })
        .map_err(|e| PipelineError::MalformedJson {
            reason: e.to_string(),
            raw: raw.to_string(),
        })
}

/// Try progressively more aggressive cuts of the text until one parses.
fn parse_free_text(raw: &str) -> Result<Value, PipelineError> {
    let trimmed = raw.trim();
    let mut candidates = vec![trimmed];

    if let Some(inner) = fenced(trimmed) {
        candidates.push(inner);
    }
    for (open, close) in [('{', '}'), ('[', ']')] {
        if let Some(slice) = enclosed(trimmed, open, close) {
            candidates.push(slice);
        }
    }

    let mut first_error = None;
    for candidate in candidates {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) => {
                if candidate.len() != trimmed.len() {
                    debug!(
                        "Recovered JSON after stripping {} chars of surrounding text",
                        trimmed.len() - candidate.len()
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    Err(PipelineError::MalformedJson {
        reason: first_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no JSON found".to_string()),
        raw: raw.to_string(),
    })
}

/// Slice from the first `open` to the last `close`, inclusive.
fn enclosed(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Separate the business data from the grounding list.
///
/// When `structured_data` is missing the remaining object (minus `layout`) is
/// the data. Non-object values are taken as data with no layout.
fn split_payload(value: Value) -> ParsedPayload {
    match value {
        Value::Object(mut map) => {
            let layout = map.remove("layout").map(parse_layout).unwrap_or_default();
            let structured_data = match map.remove("structured_data") {
                Some(data) => data,
                None => Value::Object(map),
            };
            ParsedPayload {
                structured_data,
                layout,
            }
        }
        other => ParsedPayload {
            structured_data: other,
            layout: Vec::new(),
        },
    }
}

fn parse_layout(value: Value) -> Vec<LayoutItem> {
    let Value::Array(entries) = value else {
        warn!("Ignoring non-array layout value");
        return Vec::new();
    };

    let total = entries.len();
    let items: Vec<LayoutItem> = entries.into_iter().filter_map(layout_item).collect();
    if items.len() < total {
        warn!(
            "Dropped {} of {} layout entries without a usable box_2d",
            total - items.len(),
            total
        );
    }
    items
}

fn layout_item(entry: Value) -> Option<LayoutItem> {
    let Value::Object(mut obj) = entry else {
        return None;
    };
    let box_2d = box_coords(obj.get("box_2d")?)?;
    let text = match obj.remove("text") {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    Some(LayoutItem { text, box_2d })
}

/// Exactly four numbers. Fractional values are rounded.
fn box_coords(value: &Value) -> Option<[i64; 4]> {
    let values = value.as_array()?;
    if values.len() != 4 {
        return None;
    }
    let mut coords = [0i64; 4];
    for (slot, v) in coords.iter_mut().zip(values) {
        *slot = match v.as_i64() {
            Some(n) => n,
            None => v.as_f64()?.round() as i64,
        };
    }
    Some(coords)
}
