//! Structured (JSON) payload handling.

use crate::types::Fact;
use serde_json::Value;

const FACT_LIST_KEYS: &[&str] = &["facts", "findings", "results", "evidence"];
const TEXT_KEYS: &[&str] = &["fact", "text", "statement", "finding"];
const DATE_KEYS: &[&str] = &["date", "as_of"];
const URL_KEYS: &[&str] = &["url", "source_url", "source", "link"];

/// Outcome of looking for a JSON document in a payload.
#[derive(Debug)]
pub enum JsonProbe {
    Parsed(Value),
    Malformed(String),
    Absent,
}

/// Facts and optional summary found in a JSON document.
#[derive(Debug, Default)]
pub struct StructuredFacts {
    pub facts: Vec<Fact>,
    pub summary: Option<String>,
}

/// Strip surrounding markdown code fences, keeping the fenced body.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };

    let after_fence = &trimmed[start + 3..];
    // Skip the info string (e.g. `json`) up to the end of the fence line
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];

    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Try to read the payload as a JSON object or array.
pub fn probe(raw: &str) -> JsonProbe {
    let candidate = strip_code_fences(raw);
    if !(candidate.starts_with('{') || candidate.starts_with('[')) {
        return JsonProbe::Absent;
    }

    match serde_json::from_str::<Value>(candidate) {
        Ok(value) => JsonProbe::Parsed(value),
        Err(e) => JsonProbe::Malformed(e.to_string()),
    }
}

/// Extract a list-of-facts shape from a JSON document.
///
/// Returns `None` when the document has no recognizable fact list.
pub fn extract_structured(value: &Value) -> Option<StructuredFacts> {
    let (items, summary) = match value {
        Value::Array(items) => (items, None),
        Value::Object(map) => {
            let items = FACT_LIST_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_array))?;
            let summary = map
                .get("summary")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            (items, summary)
        }
        _ => return None,
    };

    let facts = items.iter().filter_map(fact_from_item).collect();
    Some(StructuredFacts { facts, summary })
}

fn fact_from_item(item: &Value) -> Option<Fact> {
    match item {
        Value::String(text) => non_empty(text).map(Fact::new),
        Value::Object(map) => {
            let text = TEXT_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str).and_then(non_empty))?;

            let date = DATE_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str).and_then(non_empty));

            let url = URL_KEYS.iter().find_map(|key| {
                map.get(*key)
                    .and_then(Value::as_str)
                    .and_then(non_empty)
                    .filter(|s| s.starts_with("http://") || s.starts_with("https://"))
            });

            Some(Fact {
                text: text.to_string(),
                date: date.map(str::to_string),
                url: url.map(str::to_string),
            })
        }
        _ => None,
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}
