//! Remote agent client: delegates job-offer analysis to the external agent
//! HTTP service. One blocking round trip, no incremental output.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::analysis::error::AnalysisError;
use crate::analysis::normalizer::{normalize, RawPayload};
use crate::analysis::records::OfferAnalysis;
use crate::models::JobOfferRow;

pub const OFFER_ANALYSIS_PATH: &str = "/agent/offer_analysis";

#[async_trait]
pub trait OfferAgent: Send + Sync {
    async fn analyze(&self, offer: &JobOfferRow) -> Result<OfferAnalysis, AnalysisError>;
}

#[derive(Debug, Serialize)]
struct OfferAnalysisRequest<'a> {
    job_offer: JobOfferPayload<'a>,
}

#[derive(Debug, Serialize)]
struct JobOfferPayload<'a> {
    id: Uuid,
    title: &'a str,
    company_name: &'a str,
    location: Option<&'a str>,
    description: &'a str,
}

#[derive(Clone)]
pub struct AgentClient {
    client: Client,
    base_url: Option<String>,
}

impl AgentClient {
    /// `base_url` may be absent; that only becomes an error when a remote
    /// analysis is actually requested.
    pub fn new(client: Client, base_url: Option<String>) -> Self {
        Self { client, base_url }
    }

    fn endpoint(&self) -> Result<String, AnalysisError> {
        let base = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| {
                AnalysisError::NotConfigured(
                    "AGENT_API_URL is not set; the remote offer analysis backend is unavailable"
                        .to_string(),
                )
            })?;
        Ok(format!("{}{}", base.trim_end_matches('/'), OFFER_ANALYSIS_PATH))
    }
}

#[async_trait]
impl OfferAgent for AgentClient {
    async fn analyze(&self, offer: &JobOfferRow) -> Result<OfferAnalysis, AnalysisError> {
        let url = self.endpoint()?;
        let payload = OfferAnalysisRequest {
            job_offer: JobOfferPayload {
                id: offer.id,
                title: &offer.title,
                company_name: &offer.company_name,
                location: offer.location.as_deref(),
                description: &offer.raw_description,
            },
        };

        info!(job_offer_id = %offer.id, %url, "Requesting remote offer analysis");

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AnalysisError::Transport(format!("agent request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::Transport(format!("agent response unreadable: {e}")))?;

        if !status.is_success() {
            return Err(AnalysisError::Transport(format!(
                "agent returned {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        debug!(job_offer_id = %offer.id, bytes = body.len(), "Remote offer analysis received");
        parse_agent_body(&body)
    }
}

/// Reads the agent's answer. The body may be a JSON object or a JSON string
/// holding one; the result sits under `analysis`, else `data`, else is the
/// body itself.
pub fn parse_agent_body(body: &str) -> Result<OfferAnalysis, AnalysisError> {
    let mut value: Value = serde_json::from_str(body)
        .map_err(|e| AnalysisError::MalformedResponse(format!("invalid JSON body: {e}")))?;

    if let Value::String(inner) = value {
        value = serde_json::from_str(&inner).map_err(|e| {
            AnalysisError::MalformedResponse(format!("invalid JSON in string body: {e}"))
        })?;
    }

    let Value::Object(mut body) = value else {
        return Err(AnalysisError::MalformedResponse(
            "body is not a JSON object".to_string(),
        ));
    };

    let result = ["analysis", "data"]
        .into_iter()
        .find_map(|key| match body.remove(key) {
            Some(Value::Object(nested)) => Some(nested),
            _ => None,
        })
        .unwrap_or(body);

    normalize::<OfferAnalysis>(RawPayload::Mapping(result)).ok_or(AnalysisError::EmptyResponse)
}
