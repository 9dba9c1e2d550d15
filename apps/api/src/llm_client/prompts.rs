// Cross-cutting prompt fragments shared by every analysis prompt.
// Task-specific prompts live in analysis::prompts.

use serde_json::Value;

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with a single valid JSON object. \
    Do NOT include any text outside the JSON object. \
    Do NOT include explanations or apologies.";

/// Schema instruction appended to the system prompt for providers that
/// cannot enforce a response schema natively.
pub fn schema_instruction(schema: &Value) -> String {
    let rendered = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    format!(
        "{JSON_ONLY_SYSTEM}\nThe JSON object MUST match this JSON schema exactly:\n{rendered}"
    )
}
