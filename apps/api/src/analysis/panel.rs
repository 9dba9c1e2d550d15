//! Final-state views of an entity's analysis: pushed once per run as the
//! "panel" live update, and served by the GET analysis endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::analysis::backend::AnalysisBackend;
use crate::models::{CvRow, JobOfferRow};

const STATUS_AVAILABLE: &str = "analysis available";
const STATUS_PENDING: &str = "analysis pending";
const UNDEFINED_BACKEND_LABEL: &str = "Undefined flow";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CvPanel {
    pub cv_id: Uuid,
    pub analysis_available: bool,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub suggestions: Vec<String>,
}

impl From<&CvRow> for CvPanel {
    fn from(cv: &CvRow) -> Self {
        if !cv.analysis_available() {
            return CvPanel {
                cv_id: cv.id,
                analysis_available: false,
                analyzed_at: cv.analyzed_at,
                summary: None,
                strengths: Vec::new(),
                weaknesses: Vec::new(),
                suggestions: Vec::new(),
            };
        }

        CvPanel {
            cv_id: cv.id,
            analysis_available: true,
            analyzed_at: cv.analyzed_at,
            summary: cv.summary().map(String::from),
            strengths: compact(cv.strengths()),
            weaknesses: compact(cv.weaknesses()),
            suggestions: compact(cv.suggestions()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferPanel {
    pub job_offer_id: Uuid,
    pub analysis_available: bool,
    pub status: &'static str,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub tech_stack: Vec<String>,
    pub keywords: Vec<String>,
    pub seniority_level: Option<String>,
    pub backend: Option<AnalysisBackend>,
    pub backend_label: &'static str,
}

impl From<&JobOfferRow> for OfferPanel {
    fn from(offer: &JobOfferRow) -> Self {
        let available = offer.analysis_available();
        let backend = offer.analysis_backend();

        OfferPanel {
            job_offer_id: offer.id,
            analysis_available: available,
            status: if available {
                STATUS_AVAILABLE
            } else {
                STATUS_PENDING
            },
            analyzed_at: offer.analyzed_at,
            summary: offer.summary().map(String::from),
            tech_stack: compact(offer.tech_stack()),
            keywords: compact(offer.keywords()),
            seniority_level: offer.seniority_level().map(String::from),
            backend,
            backend_label: backend.map_or(UNDEFINED_BACKEND_LABEL, AnalysisBackend::label),
        }
    }
}

fn compact(items: &[String]) -> Vec<String> {
    items
        .iter()
        .filter(|s| !s.trim().is_empty())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cv() -> CvRow {
        let now = Utc::now();
        CvRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: None,
            body_text: "Go developer".to_string(),
            import_method: "upload".to_string(),
            active: false,
            analysis_summary: Some("Stale summary".to_string()),
            analysis_strengths: Some(vec!["Go".to_string(), " ".to_string()]),
            analysis_weaknesses: None,
            analysis_suggestions: None,
            analyzed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_cv_panel_hides_sections_until_analyzed() {
        let panel = CvPanel::from(&cv());
        assert!(!panel.analysis_available);
        assert_eq!(panel.summary, None);
        assert!(panel.strengths.is_empty());
    }

    #[test]
    fn test_cv_panel_shows_compacted_sections() {
        let mut row = cv();
        row.analyzed_at = Some(Utc::now());
        let panel = CvPanel::from(&row);
        assert!(panel.analysis_available);
        assert_eq!(panel.summary.as_deref(), Some("Stale summary"));
        assert_eq!(panel.strengths, vec!["Go"]);
        assert!(panel.weaknesses.is_empty());
    }

    #[test]
    fn test_offer_panel_labels() {
        let now = Utc::now();
        let mut offer = JobOfferRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Data Engineer".to_string(),
            company_name: "Acme".to_string(),
            location: None,
            contract_type: None,
            raw_description: "Spark".to_string(),
            source: "linkedin".to_string(),
            source_url: None,
            summary: None,
            tech_stack: None,
            keywords: Some(vec!["".to_string(), "remote".to_string()]),
            seniority_level: None,
            analysis_backend: None,
            analyzed_at: None,
            created_at: now,
            updated_at: now,
        };

        let pending = OfferPanel::from(&offer);
        assert_eq!(pending.status, "analysis pending");
        assert_eq!(pending.backend_label, "Undefined flow");
        assert_eq!(pending.keywords, vec!["remote"]);

        offer.summary = Some("Data platform role".to_string());
        offer.analyzed_at = Some(now);
        offer.analysis_backend = Some("python".to_string());
        let done = OfferPanel::from(&offer);
        assert_eq!(done.status, "analysis available");
        assert_eq!(done.backend, Some(AnalysisBackend::Remote));
        assert_eq!(done.backend_label, "Agent API");
    }
}
