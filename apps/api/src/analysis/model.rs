//! The seam between orchestrators and whatever produces a streamed analysis.

use async_trait::async_trait;
use serde_json::Value;

use crate::analysis::error::AnalysisError;
use crate::analysis::normalizer::RawPayload;

/// Low-variance sampling: analyses should be close to deterministic.
pub const ANALYSIS_TEMPERATURE: f64 = 0.2;

/// One structured-output analysis call.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    /// JSON schema the answer must follow.
    pub schema: Value,
    pub schema_name: &'static str,
    pub temperature: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

/// What the provider hands back once the stream has ended.
#[derive(Debug, Clone)]
pub struct FinalMessage {
    pub content: RawPayload,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait AnalysisModel: Send + Sync {
    /// Runs one analysis, calling `on_chunk` for every non-empty text chunk in
    /// arrival order, and returns the final message when the stream ends.
    async fn run(
        &self,
        request: &AnalysisRequest,
        on_chunk: &mut (dyn for<'c> FnMut(&'c str) + Send),
    ) -> Result<FinalMessage, AnalysisError>;
}
