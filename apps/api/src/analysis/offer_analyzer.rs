use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::analysis::agent_client::OfferAgent;
use crate::analysis::backend::AnalysisBackend;
use crate::analysis::error::AnalysisError;
use crate::analysis::model::{AnalysisModel, AnalysisRequest, ANALYSIS_TEMPERATURE};
use crate::analysis::normalizer::CanonicalRecord;
use crate::analysis::panel::OfferPanel;
use crate::analysis::pipeline::{
    finalize, AnalysisOutcome, AnalysisStage, StageTracker, StreamSession,
};
use crate::analysis::prompts::{offer_analysis_prompt, OFFER_ANALYSIS_SYSTEM};
use crate::analysis::records::OfferAnalysis;
use crate::config::AnalysisConfig;
use crate::live::{channel_name, EntityKind, LivePublisher, LiveUpdate};
use crate::models::JobOfferRow;
use crate::store::AnalysisStore;

const SCHEMA_NAME: &str = "job_offer_analysis";

/// Narrative text of the single progress push made by the remote backend.
pub const REMOTE_COMPLETE_MARKER: &str = "Analysis complete";

/// Analyzes a job offer through either backend, then persists the result
/// together with the backend that produced it.
pub struct OfferAnalyzer {
    model: Arc<dyn AnalysisModel>,
    agent: Arc<dyn OfferAgent>,
    store: Arc<dyn AnalysisStore>,
    publisher: Arc<dyn LivePublisher>,
    config: Arc<AnalysisConfig>,
}

impl OfferAnalyzer {
    pub fn new(
        model: Arc<dyn AnalysisModel>,
        agent: Arc<dyn OfferAgent>,
        store: Arc<dyn AnalysisStore>,
        publisher: Arc<dyn LivePublisher>,
        config: Arc<AnalysisConfig>,
    ) -> Self {
        Self {
            model,
            agent,
            store,
            publisher,
            config,
        }
    }

    /// Backend a run would use for `mode`: the mode itself, else the
    /// configured default, else the fallback. Never fails.
    pub fn select_backend(&self, mode: Option<&str>) -> AnalysisBackend {
        AnalysisBackend::resolve(mode, self.config.default_offer_backend.as_deref())
    }

    /// Runs one analysis. Same failure contract as the CV analyzer: only a
    /// failed lookup returns `Err`.
    #[instrument(skip(self))]
    pub async fn run(
        &self,
        offer_id: Uuid,
        mode: Option<&str>,
    ) -> Result<AnalysisOutcome<OfferAnalysis>, AnalysisError> {
        let mut stages = StageTracker::new(EntityKind::JobOffer, offer_id);

        let offer = self
            .store
            .find_job_offer(offer_id)
            .await
            .map_err(AnalysisError::storage)?
            .ok_or(AnalysisError::NotFound {
                entity: "Job offer",
                id: offer_id,
            })?;

        let backend = self.select_backend(mode);
        let channel = channel_name(EntityKind::JobOffer, offer_id);
        info!(%backend, "Job offer analysis started");

        match self.analyze(&mut stages, offer, backend, &channel).await {
            Ok(analysis) => {
                stages.advance(AnalysisStage::Persisted);
                Ok(AnalysisOutcome::Persisted(analysis))
            }
            Err(err) => {
                let message = err.to_string();
                error!(%backend, stage = %stages.stage(), error = %message, "Job offer analysis failed");
                stages.advance(AnalysisStage::Failed);
                self.publisher.publish(LiveUpdate::error(&channel, &message));
                Ok(AnalysisOutcome::Failed { message })
            }
        }
    }

    async fn analyze(
        &self,
        stages: &mut StageTracker,
        mut offer: JobOfferRow,
        backend: AnalysisBackend,
        channel: &str,
    ) -> Result<OfferAnalysis, AnalysisError> {
        stages.advance(AnalysisStage::Streaming);
        let analysis = match backend {
            AnalysisBackend::Primary => self.stream_from_model(stages, &offer, channel).await?,
            AnalysisBackend::Remote => self.ask_agent(stages, &offer, channel).await?,
        };
        if !analysis.has_content() {
            warn!("Job offer analysis has no summary; it will be reported as unavailable");
        }

        let analyzed_at = Utc::now();
        self.store
            .save_offer_analysis(offer.id, &analysis, backend, analyzed_at)
            .await
            .map_err(AnalysisError::storage)?;
        info!(%backend, "Job offer analysis saved");

        offer.apply_analysis(&analysis, backend, analyzed_at);
        match serde_json::to_value(OfferPanel::from(&offer)) {
            Ok(panel) => self.publisher.publish(LiveUpdate::panel(channel, panel)),
            Err(e) => warn!(error = %e, "Could not render job offer panel"),
        }

        Ok(analysis)
    }

    async fn stream_from_model(
        &self,
        stages: &mut StageTracker,
        offer: &JobOfferRow,
        channel: &str,
    ) -> Result<OfferAnalysis, AnalysisError> {
        let request = AnalysisRequest {
            system_prompt: OFFER_ANALYSIS_SYSTEM.to_string(),
            user_prompt: offer_analysis_prompt(
                &offer.title,
                &offer.company_name,
                offer.location.as_deref(),
                &offer.raw_description,
            ),
            schema: OfferAnalysis::schema(),
            schema_name: SCHEMA_NAME,
            temperature: ANALYSIS_TEMPERATURE,
        };

        let mut session = StreamSession::<OfferAnalysis>::new(channel, self.publisher.as_ref());
        let message = self
            .model
            .run(&request, &mut |chunk: &str| session.on_chunk(chunk))
            .await?;
        debug!(
            pushes = session.pushes(),
            input_tokens = ?message.usage.input_tokens,
            output_tokens = ?message.usage.output_tokens,
            "Job offer stream finished"
        );
        let buffer = session.into_buffer();

        stages.advance(AnalysisStage::Finalizing);
        finalize::<OfferAnalysis>(message.content, &buffer)
    }

    /// One round trip, then a single synthetic progress push so both
    /// backends show a stream update before the panel.
    async fn ask_agent(
        &self,
        stages: &mut StageTracker,
        offer: &JobOfferRow,
        channel: &str,
    ) -> Result<OfferAnalysis, AnalysisError> {
        let analysis = self.agent.analyze(offer).await?;

        match serde_json::to_value(&analysis) {
            Ok(value) => self.publisher.publish(LiveUpdate::stream(
                channel,
                Some(REMOTE_COMPLETE_MARKER.to_string()),
                value,
            )),
            Err(e) => warn!(error = %e, "Could not serialize agent analysis"),
        }

        stages.advance(AnalysisStage::Finalizing);
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::agent_client::AgentClient;
    use crate::analysis::normalizer::RawPayload;
    use crate::live::{LivePayload, LiveTarget};
    use crate::test_support::{
        analysis_config, job_offer_fixture, MemoryStore, RecordingPublisher, ScriptedModel,
        StubAgent,
    };
    use serde_json::json;

    struct Harness {
        analyzer: OfferAnalyzer,
        store: Arc<MemoryStore>,
        publisher: Arc<RecordingPublisher>,
        model: Arc<ScriptedModel>,
    }

    fn harness(
        model: ScriptedModel,
        agent: Arc<dyn OfferAgent>,
        default_backend: Option<&str>,
        offer: &JobOfferRow,
    ) -> Harness {
        let store = Arc::new(MemoryStore::default());
        store.insert_job_offer(offer.clone());
        let publisher = Arc::new(RecordingPublisher::default());
        let model = Arc::new(model);
        let analyzer = OfferAnalyzer::new(
            model.clone(),
            agent,
            store.clone(),
            publisher.clone(),
            Arc::new(analysis_config(default_backend, None)),
        );
        Harness {
            analyzer,
            store,
            publisher,
            model,
        }
    }

    fn agent_result() -> OfferAnalysis {
        OfferAnalysis {
            summary: "Platform team role".to_string(),
            tech_stack: vec!["Kubernetes".to_string()],
            keywords: vec!["on-call".to_string()],
            seniority_level: "Senior".to_string(),
        }
    }

    #[tokio::test]
    async fn test_primary_backend_streams_and_records_backend() {
        let offer = job_offer_fixture();
        let model = ScriptedModel::streaming(
            &[
                "{\"summary\":\"Backend role\",",
                "\"tech_stack\":[\"Rust\",\"\"],\"keywords\":[],\"seniority_level\":\"Senior\"}",
            ],
            RawPayload::Text(String::new()),
        );
        let h = harness(model, Arc::new(StubAgent::failing("unused")), None, &offer);

        let outcome = h.analyzer.run(offer.id, None).await.unwrap();

        assert!(matches!(outcome, AnalysisOutcome::Persisted(_)));
        let stored = h.store.job_offer(offer.id).unwrap();
        assert_eq!(stored.summary(), Some("Backend role"));
        assert_eq!(stored.tech_stack(), ["Rust".to_string()]);
        assert_eq!(stored.analysis_backend(), Some(AnalysisBackend::Primary));
        assert_eq!(stored.analysis_backend.as_deref(), Some("rails"));

        let requests = h.model.requests();
        assert_eq!(requests[0].schema_name, "job_offer_analysis");
        assert!(requests[0].user_prompt.contains(&offer.title));

        let updates = h.publisher.updates();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].target, LiveTarget::AnalysisStream);
        match &updates[1].payload {
            LivePayload::Panel { panel } => {
                assert_eq!(panel["backend_label"], "Rails LLM");
                assert_eq!(panel["status"], "analysis available");
            }
            other => panic!("expected panel, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_mode_silently_uses_primary() {
        let offer = job_offer_fixture();
        let model = ScriptedModel::streaming(&[], RawPayload::from(json!({"summary": "ok"})));
        let h = harness(model, Arc::new(StubAgent::failing("unused")), None, &offer);

        assert_eq!(h.analyzer.select_backend(Some("cobol")), AnalysisBackend::Primary);

        let outcome = h.analyzer.run(offer.id, Some("cobol")).await.unwrap();

        assert!(matches!(outcome, AnalysisOutcome::Persisted(_)));
        assert_eq!(h.model.requests().len(), 1);
        assert_eq!(
            h.store.job_offer(offer.id).unwrap().analysis_backend(),
            Some(AnalysisBackend::Primary)
        );
    }

    #[tokio::test]
    async fn test_configured_default_selects_remote() {
        let offer = job_offer_fixture();
        let agent = Arc::new(StubAgent::returning(agent_result()));
        let h = harness(
            ScriptedModel::failing("model must not be called"),
            agent.clone(),
            Some("python"),
            &offer,
        );

        let outcome = h.analyzer.run(offer.id, None).await.unwrap();

        assert_eq!(outcome, AnalysisOutcome::Persisted(agent_result()));
        assert_eq!(agent.calls(), 1);
        assert!(h.model.requests().is_empty());
    }

    #[tokio::test]
    async fn test_remote_backend_makes_one_progress_push_then_panel() {
        let offer = job_offer_fixture();
        let h = harness(
            ScriptedModel::failing("model must not be called"),
            Arc::new(StubAgent::returning(agent_result())),
            None,
            &offer,
        );

        let outcome = h.analyzer.run(offer.id, Some("python")).await.unwrap();

        assert!(matches!(outcome, AnalysisOutcome::Persisted(_)));
        let stored = h.store.job_offer(offer.id).unwrap();
        assert_eq!(stored.analysis_backend.as_deref(), Some("python"));
        assert_eq!(stored.seniority_level(), Some("Senior"));

        let updates = h.publisher.updates();
        assert_eq!(updates.len(), 2);
        match &updates[0].payload {
            LivePayload::Stream {
                raw_content,
                analysis,
            } => {
                assert_eq!(raw_content.as_deref(), Some("Analysis complete"));
                assert_eq!(analysis["tech_stack"], json!(["Kubernetes"]));
            }
            other => panic!("expected stream push, got {other:?}"),
        }
        match &updates[1].payload {
            LivePayload::Panel { panel } => assert_eq!(panel["backend_label"], "Agent API"),
            other => panic!("expected panel, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_remote_transport_failure_broadcasts_once() {
        let offer = job_offer_fixture();
        let h = harness(
            ScriptedModel::failing("model must not be called"),
            Arc::new(StubAgent::failing("agent returned 502 Bad Gateway: upstream down")),
            None,
            &offer,
        );

        let outcome = h.analyzer.run(offer.id, Some("python")).await.unwrap();

        assert!(matches!(outcome, AnalysisOutcome::Failed { .. }));
        let stored = h.store.job_offer(offer.id).unwrap();
        assert!(stored.analyzed_at.is_none());
        assert!(stored.analysis_backend.is_none());

        let updates = h.publisher.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].target, LiveTarget::Analysis);
        assert!(matches!(
            &updates[0].payload,
            LivePayload::Error { message } if message.contains("502 Bad Gateway")
        ));
    }

    #[tokio::test]
    async fn test_remote_without_agent_url_is_a_broadcast_error() {
        let offer = job_offer_fixture();
        let agent = Arc::new(AgentClient::new(reqwest::Client::new(), None));
        let h = harness(
            ScriptedModel::failing("model must not be called"),
            agent,
            None,
            &offer,
        );

        let outcome = h.analyzer.run(offer.id, Some("python")).await.unwrap();

        match outcome {
            AnalysisOutcome::Failed { message } => assert!(message.contains("AGENT_API_URL")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(h.publisher.updates().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_offer_ends_without_broadcast() {
        let offer = job_offer_fixture();
        let h = harness(
            ScriptedModel::failing("unused"),
            Arc::new(StubAgent::failing("unused")),
            None,
            &offer,
        );

        let result = h.analyzer.run(Uuid::new_v4(), Some("python")).await;

        assert!(matches!(result, Err(AnalysisError::NotFound { .. })));
        assert!(h.publisher.updates().is_empty());
    }
}
