//! Streaming chat-completion client used for every analysis call.
//!
//! Streams a completion from the configured provider (Anthropic Messages or
//! OpenAI Chat Completions), forwarding each non-empty text delta to the
//! caller as it arrives and returning the aggregated message at the end.
//! Provider and transport failures never leave this module as anything but
//! [`LlmError`], and become `AnalysisError` at the model seam.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analysis::error::AnalysisError;
use crate::analysis::model::{AnalysisModel, AnalysisRequest, FinalMessage, TokenUsage};
use crate::analysis::normalizer::RawPayload;
use crate::config::{LlmProvider, LlmSettings};

pub mod events;
pub mod prompts;
pub mod sse;

use events::{parse_anthropic, parse_openai, ProviderEvent};
use sse::{SseDecoder, SseEvent};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM not configured: {0}")]
    NotConfigured(String),
}

impl From<LlmError> for AnalysisError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::NotConfigured(msg) => AnalysisError::NotConfigured(msg),
            other => AnalysisError::Transport(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

/// Text and usage accumulated over one streamed completion.
#[derive(Debug, Default)]
pub struct StreamedMessage {
    pub text: String,
    pub usage: TokenUsage,
}

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    settings: LlmSettings,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, settings })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// Streams one completion. Empty deltas are dropped before they reach
    /// `on_chunk` or the aggregated text.
    pub async fn stream(
        &self,
        request: &AnalysisRequest,
        on_chunk: &mut (dyn for<'c> FnMut(&'c str) + Send),
    ) -> Result<StreamedMessage, LlmError> {
        let api_key = self.settings.api_key.as_deref().ok_or_else(|| {
            LlmError::NotConfigured(format!(
                "no API key for provider {:?}",
                self.settings.provider
            ))
        })?;

        let response = self.open_stream(api_key, request).await?;
        info!(model = %self.settings.model, "LLM stream started");

        let mut message = StreamedMessage::default();
        let mut decoder = SseDecoder::new();
        let mut bytes = response.bytes_stream();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk?;
            for event in decoder.push(&chunk) {
                if self.apply_event(&event, &mut message, on_chunk)? {
                    return Ok(self.finish(message));
                }
            }
        }
        if let Some(event) = decoder.finish() {
            self.apply_event(&event, &mut message, on_chunk)?;
        }

        Ok(self.finish(message))
    }

    /// Returns `true` once the provider signals the end of the stream.
    fn apply_event(
        &self,
        event: &SseEvent,
        message: &mut StreamedMessage,
        on_chunk: &mut (dyn for<'c> FnMut(&'c str) + Send),
    ) -> Result<bool, LlmError> {
        let parsed = match self.settings.provider {
            LlmProvider::Anthropic => parse_anthropic(event)?,
            LlmProvider::OpenAi => parse_openai(event)?,
        };

        match parsed {
            ProviderEvent::TextDelta(text) => {
                if !text.is_empty() {
                    message.text.push_str(&text);
                    on_chunk(&text);
                }
            }
            ProviderEvent::Usage {
                input_tokens,
                output_tokens,
            } => {
                if input_tokens.is_some() {
                    message.usage.input_tokens = input_tokens;
                }
                if output_tokens.is_some() {
                    message.usage.output_tokens = output_tokens;
                }
            }
            ProviderEvent::Done => return Ok(true),
            ProviderEvent::Ignored => {}
        }
        Ok(false)
    }

    fn finish(&self, message: StreamedMessage) -> StreamedMessage {
        debug!(
            "LLM stream finished: chars={}, input_tokens={:?}, output_tokens={:?}",
            message.text.len(),
            message.usage.input_tokens,
            message.usage.output_tokens
        );
        message
    }

    /// Opens the streaming request. Retries on 429 (rate limit) and 5xx with
    /// exponential backoff; nothing is retried once the stream is flowing.
    async fn open_stream(
        &self,
        api_key: &str,
        request: &AnalysisRequest,
    ) -> Result<Response, LlmError> {
        let (url, body) = self.request_parts(request);
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let builder = self
                .client
                .post(&url)
                .header("content-type", "application/json")
                .header("accept", "text/event-stream");
            let builder = match self.settings.provider {
                LlmProvider::Anthropic => builder
                    .header("x-api-key", api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION),
                LlmProvider::OpenAi => builder.bearer_auth(api_key),
            };

            let response = match builder.json(&body).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ProviderError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    fn request_parts(&self, request: &AnalysisRequest) -> (String, Value) {
        let base = self.settings.base_url.trim_end_matches('/');
        match self.settings.provider {
            LlmProvider::Anthropic => (
                format!("{base}/v1/messages"),
                json!({
                    "model": self.settings.model,
                    "max_tokens": MAX_TOKENS,
                    "system": format!(
                        "{}\n\n{}",
                        request.system_prompt,
                        prompts::schema_instruction(&request.schema)
                    ),
                    "messages": [{"role": "user", "content": request.user_prompt}],
                    "temperature": request.temperature,
                    "stream": true,
                }),
            ),
            LlmProvider::OpenAi => (
                format!("{base}/v1/chat/completions"),
                json!({
                    "model": self.settings.model,
                    "messages": [
                        {"role": "system", "content": request.system_prompt},
                        {"role": "user", "content": request.user_prompt},
                    ],
                    "temperature": request.temperature,
                    "stream": true,
                    "stream_options": {"include_usage": true},
                    "response_format": {
                        "type": "json_schema",
                        "json_schema": {
                            "name": request.schema_name,
                            "schema": request.schema,
                            "strict": true,
                        },
                    },
                }),
            ),
        }
    }
}

#[async_trait]
impl AnalysisModel for LlmClient {
    async fn run(
        &self,
        request: &AnalysisRequest,
        on_chunk: &mut (dyn for<'c> FnMut(&'c str) + Send),
    ) -> Result<FinalMessage, AnalysisError> {
        let message = self.stream(request, on_chunk).await?;
        Ok(FinalMessage {
            content: RawPayload::Text(message.text),
            usage: message.usage,
        })
    }
}
