//! Best-effort recovery of a JSON object from a growing LLM text buffer.
//!
//! The heuristic takes the span between the first `{` and the last `}` and
//! parses it strictly. It is re-run over the whole buffer on every chunk, so a
//! model that restates or corrects earlier tokens still converges. A stray `}`
//! in prose after the real object corrupts the span; callers simply see no
//! fragment until the buffer makes sense again.

use serde_json::{Map, Value};

/// A JSON object located inside a text buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonFragment {
    /// The exact text span that was parsed, braces included.
    pub raw: String,
    pub parsed: Map<String, Value>,
}

/// Locates and parses the outermost-looking JSON object in `buffer`.
/// Returns `None` on any failure; never panics.
pub fn extract(buffer: &str) -> Option<JsonFragment> {
    let span = json_span(buffer)?;
    match serde_json::from_str::<Value>(span) {
        Ok(Value::Object(parsed)) => Some(JsonFragment {
            raw: span.to_string(),
            parsed,
        }),
        _ => None,
    }
}

/// Slice from the first `{` to the last `}`, if the closing brace strictly follows.
fn json_span(buffer: &str) -> Option<&str> {
    let start = buffer.find('{')?;
    let end = buffer.rfind('}')?;
    if end <= start {
        return None;
    }
    // Both delimiters are ASCII, so these are valid char boundaries.
    Some(&buffer[start..=end])
}

/// Removes markdown code fences (```` ``` ```` and ```` ```json ````, any case).
pub fn strip_code_fences(text: &str) -> String {
    const FENCE: &str = "```";
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(FENCE) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + FENCE.len()..];
        if rest
            .get(..4)
            .is_some_and(|tag| tag.eq_ignore_ascii_case("json"))
        {
            rest = &rest[4..];
        }
    }
    out.push_str(rest);
    out
}

/// The narrative part of a streaming buffer: fences and the already-extracted
/// JSON span removed, trimmed. `None` when nothing readable remains.
pub fn narrative_text(buffer: &str, json_span: Option<&str>) -> Option<String> {
    let mut text = strip_code_fences(buffer);
    if let Some(span) = json_span.filter(|s| !s.is_empty()) {
        text = text.replace(span, "");
    }
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
