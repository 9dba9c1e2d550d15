use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::analysis::records::CvAnalysis;

/// A CV as stored. Analysis columns stay NULL until the first successful run;
/// read through the accessors below, never through the raw columns.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CvRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub body_text: String,
    pub import_method: String,
    pub active: bool,
    pub analysis_summary: Option<String>,
    pub analysis_strengths: Option<Vec<String>>,
    pub analysis_weaknesses: Option<Vec<String>>,
    pub analysis_suggestions: Option<Vec<String>>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CvRow {
    pub fn summary(&self) -> Option<&str> {
        self.analysis_summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }

    pub fn strengths(&self) -> &[String] {
        self.analysis_strengths.as_deref().unwrap_or_default()
    }

    pub fn weaknesses(&self) -> &[String] {
        self.analysis_weaknesses.as_deref().unwrap_or_default()
    }

    pub fn suggestions(&self) -> &[String] {
        self.analysis_suggestions.as_deref().unwrap_or_default()
    }

    /// True once a run has persisted and left at least one section filled.
    pub fn analysis_available(&self) -> bool {
        self.analyzed_at.is_some()
            && (self.summary().is_some()
                || !self.strengths().is_empty()
                || !self.weaknesses().is_empty()
                || !self.suggestions().is_empty())
    }

    /// Mirrors a persisted analysis onto this in-memory row.
    pub fn apply_analysis(&mut self, analysis: &CvAnalysis, analyzed_at: DateTime<Utc>) {
        self.analysis_summary = Some(analysis.summary.clone());
        self.analysis_strengths = Some(analysis.strengths.clone());
        self.analysis_weaknesses = Some(analysis.weaknesses.clone());
        self.analysis_suggestions = Some(analysis.suggestions.clone());
        self.analyzed_at = Some(analyzed_at);
        self.updated_at = analyzed_at;
    }
}
