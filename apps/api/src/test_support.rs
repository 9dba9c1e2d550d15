//! In-memory doubles shared by unit and route tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::analysis::agent_client::OfferAgent;
use crate::analysis::backend::AnalysisBackend;
use crate::analysis::error::AnalysisError;
use crate::analysis::model::{AnalysisModel, AnalysisRequest, FinalMessage, TokenUsage};
use crate::analysis::normalizer::RawPayload;
use crate::analysis::records::{CvAnalysis, OfferAnalysis};
use crate::config::{AnalysisConfig, LlmProvider, LlmSettings};
use crate::live::{LivePublisher, LiveUpdate};
use crate::models::{CvRow, JobOfferRow};
use crate::store::AnalysisStore;

// ── Store ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    cvs: Mutex<HashMap<Uuid, CvRow>>,
    offers: Mutex<HashMap<Uuid, JobOfferRow>>,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn insert_cv(&self, cv: CvRow) {
        self.cvs.lock().unwrap().insert(cv.id, cv);
    }

    pub fn insert_job_offer(&self, offer: JobOfferRow) {
        self.offers.lock().unwrap().insert(offer.id, offer);
    }

    pub fn cv(&self, id: Uuid) -> Option<CvRow> {
        self.cvs.lock().unwrap().get(&id).cloned()
    }

    pub fn job_offer(&self, id: Uuid) -> Option<JobOfferRow> {
        self.offers.lock().unwrap().get(&id).cloned()
    }

    /// Makes every later save fail.
    pub fn fail_saves(&self) {
        self.fail_saves.store(true, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            bail!("database is read-only");
        }
        Ok(())
    }
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    async fn find_cv(&self, id: Uuid) -> Result<Option<CvRow>> {
        Ok(self.cv(id))
    }

    async fn save_cv_analysis(
        &self,
        id: Uuid,
        analysis: &CvAnalysis,
        analyzed_at: DateTime<Utc>,
    ) -> Result<()> {
        self.check_writable()?;
        let mut cvs = self.cvs.lock().unwrap();
        match cvs.get_mut(&id) {
            Some(cv) => {
                cv.apply_analysis(analysis, analyzed_at);
                Ok(())
            }
            None => bail!("CV {id} vanished"),
        }
    }

    async fn find_job_offer(&self, id: Uuid) -> Result<Option<JobOfferRow>> {
        Ok(self.job_offer(id))
    }

    async fn save_offer_analysis(
        &self,
        id: Uuid,
        analysis: &OfferAnalysis,
        backend: AnalysisBackend,
        analyzed_at: DateTime<Utc>,
    ) -> Result<()> {
        self.check_writable()?;
        let mut offers = self.offers.lock().unwrap();
        match offers.get_mut(&id) {
            Some(offer) => {
                offer.apply_analysis(analysis, backend, analyzed_at);
                Ok(())
            }
            None => bail!("job offer {id} vanished"),
        }
    }
}

// ── Live publisher ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingPublisher {
    updates: Mutex<Vec<LiveUpdate>>,
}

impl RecordingPublisher {
    pub fn updates(&self) -> Vec<LiveUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

impl LivePublisher for RecordingPublisher {
    fn publish(&self, update: LiveUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

// ── Model and agent ─────────────────────────────────────────────────────────

/// Replays fixed chunks, then returns a fixed final message or error.
pub struct ScriptedModel {
    chunks: Vec<String>,
    outcome: std::result::Result<RawPayload, String>,
    requests: Mutex<Vec<AnalysisRequest>>,
}

impl ScriptedModel {
    pub fn streaming(chunks: &[&str], content: RawPayload) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            outcome: Ok(content),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            chunks: Vec::new(),
            outcome: Err(message.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<AnalysisRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisModel for ScriptedModel {
    async fn run(
        &self,
        request: &AnalysisRequest,
        on_chunk: &mut (dyn for<'c> FnMut(&'c str) + Send),
    ) -> std::result::Result<FinalMessage, AnalysisError> {
        self.requests.lock().unwrap().push(request.clone());
        for chunk in &self.chunks {
            if !chunk.is_empty() {
                on_chunk(chunk.as_str());
            }
        }
        match &self.outcome {
            Ok(content) => Ok(FinalMessage {
                content: content.clone(),
                usage: TokenUsage::default(),
            }),
            Err(message) => Err(AnalysisError::Transport(message.clone())),
        }
    }
}

pub struct StubAgent {
    outcome: std::result::Result<OfferAnalysis, String>,
    calls: AtomicUsize,
}

impl StubAgent {
    pub fn returning(analysis: OfferAnalysis) -> Self {
        Self {
            outcome: Ok(analysis),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OfferAgent for StubAgent {
    async fn analyze(
        &self,
        _offer: &JobOfferRow,
    ) -> std::result::Result<OfferAnalysis, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone().map_err(AnalysisError::Transport)
    }
}

// ── Fixtures ────────────────────────────────────────────────────────────────

pub fn analysis_config(
    default_offer_backend: Option<&str>,
    agent_api_url: Option<&str>,
) -> AnalysisConfig {
    AnalysisConfig {
        llm: LlmSettings {
            provider: LlmProvider::Anthropic,
            model: LlmProvider::Anthropic.default_model().to_string(),
            base_url: LlmProvider::Anthropic.default_base_url().to_string(),
            api_key: None,
            timeout: Duration::from_secs(5),
        },
        default_offer_backend: default_offer_backend.map(String::from),
        agent_api_url: agent_api_url.map(String::from),
    }
}

/// A freshly imported CV: no analysis yet.
pub fn cv_fixture(body_text: &str) -> CvRow {
    let now = Utc::now();
    CvRow {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        title: Some("Main CV".to_string()),
        body_text: body_text.to_string(),
        import_method: "paste".to_string(),
        active: true,
        analysis_summary: None,
        analysis_strengths: None,
        analysis_weaknesses: None,
        analysis_suggestions: None,
        analyzed_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// A freshly imported job offer: no analysis yet.
pub fn job_offer_fixture() -> JobOfferRow {
    let now = Utc::now();
    JobOfferRow {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        title: "Senior Backend Engineer".to_string(),
        company_name: "Acme Cloud".to_string(),
        location: Some("Lyon".to_string()),
        contract_type: Some("CDI".to_string()),
        raw_description: "Build and run our Rust services on Kubernetes.".to_string(),
        source: "linkedin".to_string(),
        source_url: None,
        summary: None,
        tech_stack: None,
        keywords: None,
        seniority_level: None,
        analysis_backend: None,
        analyzed_at: None,
        created_at: now,
        updated_at: now,
    }
}
