use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Execution path for a job-offer analysis.
///
/// Stored and sent over the wire as `rails` (primary, direct LLM call) and
/// `python` (remote agent HTTP service).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalysisBackend {
    #[default]
    #[serde(rename = "rails")]
    Primary,
    #[serde(rename = "python")]
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown analysis backend '{0}' (expected 'rails' or 'python')")]
pub struct UnknownBackend(pub String);

impl AnalysisBackend {
    pub const FALLBACK: AnalysisBackend = AnalysisBackend::Primary;

    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisBackend::Primary => "rails",
            AnalysisBackend::Remote => "python",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AnalysisBackend::Primary => "Rails LLM",
            AnalysisBackend::Remote => "Agent API",
        }
    }

    /// Picks the backend for one run: the explicit mode, else the configured
    /// default, else the fallback. An unrecognised value downgrades to the
    /// fallback instead of failing the run.
    pub fn resolve(explicit: Option<&str>, configured: Option<&str>) -> AnalysisBackend {
        let candidate = [explicit, configured]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty());

        match candidate {
            None => Self::FALLBACK,
            Some(raw) => raw.parse().unwrap_or_else(|err: UnknownBackend| {
                warn!(%err, fallback = Self::FALLBACK.as_str(), "Falling back to default analysis backend");
                Self::FALLBACK
            }),
        }
    }
}

impl FromStr for AnalysisBackend {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rails" | "primary" => Ok(AnalysisBackend::Primary),
            "python" | "remote" => Ok(AnalysisBackend::Remote),
            _ => Err(UnknownBackend(s.to_string())),
        }
    }
}

impl fmt::Display for AnalysisBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
