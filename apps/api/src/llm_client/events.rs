//! Provider-specific interpretation of streamed SSE events.

use serde_json::Value;
use tracing::debug;

use crate::llm_client::sse::SseEvent;
use crate::llm_client::LlmError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    TextDelta(String),
    Usage {
        input_tokens: Option<u32>,
        output_tokens: Option<u32>,
    },
    Done,
    Ignored,
}

/// Anthropic Messages API stream:
/// `message_start → content_block_* → message_delta → message_stop`.
pub fn parse_anthropic(event: &SseEvent) -> Result<ProviderEvent, LlmError> {
    let Some(json) = parse_data(event) else {
        return Ok(ProviderEvent::Ignored);
    };

    let event_type = event
        .event
        .as_deref()
        .or_else(|| json.get("type").and_then(Value::as_str))
        .unwrap_or_default();

    Ok(match event_type {
        "content_block_delta" => match json.pointer("/delta/text").and_then(Value::as_str) {
            Some(text) if json.pointer("/delta/type").and_then(Value::as_str) == Some("text_delta") => {
                ProviderEvent::TextDelta(text.to_string())
            }
            _ => ProviderEvent::Ignored,
        },
        "message_start" => ProviderEvent::Usage {
            input_tokens: token_count(&json, "/message/usage/input_tokens"),
            output_tokens: None,
        },
        "message_delta" => ProviderEvent::Usage {
            input_tokens: None,
            output_tokens: token_count(&json, "/usage/output_tokens"),
        },
        "message_stop" => ProviderEvent::Done,
        "error" => return Err(LlmError::Stream(error_message(&json))),
        _ => ProviderEvent::Ignored,
    })
}

/// OpenAI Chat Completions stream: `choices[0].delta.content` chunks, then `[DONE]`.
pub fn parse_openai(event: &SseEvent) -> Result<ProviderEvent, LlmError> {
    if event.is_done_marker() {
        return Ok(ProviderEvent::Done);
    }
    let Some(json) = parse_data(event) else {
        return Ok(ProviderEvent::Ignored);
    };

    if json.get("error").is_some() {
        return Err(LlmError::Stream(error_message(&json)));
    }

    if let Some(text) = json
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
    {
        return Ok(ProviderEvent::TextDelta(text.to_string()));
    }

    if json.get("usage").is_some_and(|u| !u.is_null()) {
        return Ok(ProviderEvent::Usage {
            input_tokens: token_count(&json, "/usage/prompt_tokens"),
            output_tokens: token_count(&json, "/usage/completion_tokens"),
        });
    }

    Ok(ProviderEvent::Ignored)
}

fn parse_data(event: &SseEvent) -> Option<Value> {
    match serde_json::from_str(&event.data) {
        Ok(json) => Some(json),
        Err(e) => {
            debug!(error = %e, "Skipping unparseable stream event");
            None
        }
    }
}

fn token_count(json: &Value, pointer: &str) -> Option<u32> {
    json.pointer(pointer)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
}

fn error_message(json: &Value) -> String {
    json.pointer("/error/message")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| json.to_string())
}
