//! Payload normalization into canonical analysis records.
//!
//! Sources arrive in three shapes: an already-parsed JSON object, a blob of
//! text that may contain one, or something we cannot read at all. Each is an
//! explicit [`RawPayload`] variant; only the first two can ever yield a record.
//! `None` means "nothing usable yet", which streaming callers tolerate.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::analysis::extractor::{extract, strip_code_fences};

/// Input to [`normalize`].
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    Mapping(Map<String, Value>),
    Text(String),
    Unsupported,
}

impl From<Value> for RawPayload {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => RawPayload::Mapping(map),
            Value::String(text) => RawPayload::Text(text),
            _ => RawPayload::Unsupported,
        }
    }
}

impl From<String> for RawPayload {
    fn from(text: String) -> Self {
        RawPayload::Text(text)
    }
}

/// A fixed-shape analysis result. Every expected key is always populated.
pub trait CanonicalRecord: Serialize + Sized {
    /// Builds the record from a mapping, defaulting every missing key.
    fn from_mapping(map: &Map<String, Value>) -> Self;

    /// JSON schema enforced on the model's structured output.
    fn schema() -> Value;

    /// Whether any content field carries data.
    fn has_content(&self) -> bool;
}

/// Converts a raw payload into a canonical record.
pub fn normalize<R: CanonicalRecord>(payload: RawPayload) -> Option<R> {
    match payload {
        RawPayload::Mapping(map) if map.is_empty() => None,
        RawPayload::Mapping(map) => Some(R::from_mapping(&map)),
        RawPayload::Text(text) => {
            if text.trim().is_empty() {
                return None;
            }
            let fragment = extract(&strip_code_fences(&text))?;
            if fragment.parsed.is_empty() {
                return None;
            }
            Some(R::from_mapping(&fragment.parsed))
        }
        RawPayload::Unsupported => None,
    }
}

/// Reads a list field: flattened one level, stringified, trimmed, blanks dropped.
/// A lone scalar counts as a one-element list.
pub fn list_field(map: &Map<String, Value>, key: &str) -> Vec<String> {
    let items: Vec<&Value> = match map.get(key) {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(values)) => values
            .iter()
            .flat_map(|v| match v {
                Value::Array(inner) => inner.iter().collect::<Vec<_>>(),
                other => vec![other],
            })
            .collect(),
        Some(other) => vec![other],
    };

    items
        .into_iter()
        .filter_map(scalar_to_string)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Reads a string field. Absent and null both become the empty string.
pub fn string_field(map: &Map<String, Value>, key: &str) -> String {
    map.get(key).and_then(scalar_to_string).unwrap_or_default()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}
