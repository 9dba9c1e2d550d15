use std::sync::Arc;

use crate::analysis::cv_analyzer::CvAnalyzer;
use crate::analysis::offer_analyzer::OfferAnalyzer;
use crate::live::LiveHub;
use crate::store::AnalysisStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AnalysisStore>,
    pub cv_analyzer: Arc<CvAnalyzer>,
    pub offer_analyzer: Arc<OfferAnalyzer>,
    /// Fan-out for live updates; the analyzers publish into the same hub.
    pub live: LiveHub,
}
