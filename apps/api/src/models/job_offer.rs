use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::analysis::backend::AnalysisBackend;
use crate::analysis::records::OfferAnalysis;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobOfferRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub company_name: String,
    pub location: Option<String>,
    pub contract_type: Option<String>,
    pub raw_description: String,
    pub source: String,
    pub source_url: Option<String>,
    pub summary: Option<String>,
    pub tech_stack: Option<Vec<String>>,
    pub keywords: Option<Vec<String>>,
    pub seniority_level: Option<String>,
    /// `rails` | `python`; NULL until analyzed.
    pub analysis_backend: Option<String>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobOfferRow {
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref().filter(|s| !s.trim().is_empty())
    }

    pub fn tech_stack(&self) -> &[String] {
        self.tech_stack.as_deref().unwrap_or_default()
    }

    pub fn keywords(&self) -> &[String] {
        self.keywords.as_deref().unwrap_or_default()
    }

    pub fn seniority_level(&self) -> Option<&str> {
        self.seniority_level
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }

    /// The backend recorded by the last run, if it is one we know.
    pub fn analysis_backend(&self) -> Option<AnalysisBackend> {
        self.analysis_backend.as_deref()?.parse().ok()
    }

    pub fn analysis_available(&self) -> bool {
        self.analyzed_at.is_some() && self.summary().is_some()
    }

    pub fn apply_analysis(
        &mut self,
        analysis: &OfferAnalysis,
        backend: AnalysisBackend,
        analyzed_at: DateTime<Utc>,
    ) {
        self.summary = Some(analysis.summary.clone());
        self.tech_stack = Some(analysis.tech_stack.clone());
        self.keywords = Some(analysis.keywords.clone());
        self.seniority_level = Some(analysis.seniority_level.clone());
        self.analysis_backend = Some(backend.as_str().to_string());
        self.analyzed_at = Some(analyzed_at);
        self.updated_at = analyzed_at;
    }
}
