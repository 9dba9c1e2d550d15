use thiserror::Error;
use uuid::Uuid;

/// Everything that can end an analysis run.
///
/// `NotFound` is the only hard stop: the run ends without broadcasting.
/// Every other variant is turned into a single error broadcast on the
/// entity's live channel and never reaches the task runner as a crash.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Analysis backend not configured: {0}")]
    NotConfigured(String),

    #[error("Analysis failed: {0}")]
    Transport(String),

    #[error("Analysis failed: empty response")]
    EmptyResponse,

    #[error("Analysis failed: malformed response ({0})")]
    MalformedResponse(String),

    #[error("Analysis could not be saved: {0}")]
    Storage(String),
}

impl AnalysisError {
    pub fn storage(err: anyhow::Error) -> Self {
        AnalysisError::Storage(format!("{err:#}"))
    }
}
