use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub rust_log: String,
    /// Everything the analysis pipeline reads. Shared read-only with every task.
    pub analysis: Arc<AnalysisConfig>,
}

/// Immutable settings consumed by the analysis orchestrators and their clients.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub llm: LlmSettings,
    /// Raw `DEFAULT_OFFER_ANALYSIS_BACKEND`; resolved (with fallback) per run.
    pub default_offer_backend: Option<String>,
    /// Base URL of the remote agent service. Only checked when that backend runs.
    pub agent_api_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Anthropic,
    OpenAi,
}

impl LlmProvider {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Some(LlmProvider::Anthropic),
            "openai" => Some(LlmProvider::OpenAi),
            _ => None,
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "claude-sonnet-4-5",
            LlmProvider::OpenAi => "gpt-4o-mini",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "https://api.anthropic.com",
            LlmProvider::OpenAi => "https://api.openai.com",
        }
    }

    fn api_key_var(self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "ANTHROPIC_API_KEY",
            LlmProvider::OpenAi => "OPENAI_API_KEY",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    pub model: String,
    pub base_url: String,
    /// Missing keys surface as a configuration error when a call is attempted.
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            analysis: Arc::new(AnalysisConfig::from_env()?),
        })
    }
}

impl AnalysisConfig {
    pub fn from_env() -> Result<Self> {
        let provider = match optional_env("LLM_PROVIDER") {
            Some(raw) => match LlmProvider::parse(&raw) {
                Some(provider) => provider,
                None => bail!("LLM_PROVIDER must be 'anthropic' or 'openai', got '{raw}'"),
            },
            None => LlmProvider::Anthropic,
        };

        let timeout_secs = match optional_env("LLM_TIMEOUT") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("LLM_TIMEOUT must be a number of seconds, got '{raw}'"))?,
            None => 120,
        };

        Ok(AnalysisConfig {
            llm: LlmSettings {
                provider,
                model: optional_env("LLM_MODEL")
                    .unwrap_or_else(|| provider.default_model().to_string()),
                base_url: optional_env("LLM_BASE_URL")
                    .unwrap_or_else(|| provider.default_base_url().to_string()),
                api_key: optional_env(provider.api_key_var()),
                timeout: Duration::from_secs(timeout_secs),
            },
            default_offer_backend: optional_env("DEFAULT_OFFER_ANALYSIS_BACKEND"),
            agent_api_url: optional_env("AGENT_API_URL"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Reads an optional variable, treating blank values as unset.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
