use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::analysis::error::AnalysisError;
use crate::analysis::model::{AnalysisModel, AnalysisRequest, ANALYSIS_TEMPERATURE};
use crate::analysis::normalizer::CanonicalRecord;
use crate::analysis::panel::CvPanel;
use crate::analysis::pipeline::{
    finalize, AnalysisOutcome, AnalysisStage, StageTracker, StreamSession,
};
use crate::analysis::prompts::{cv_analysis_prompt, CV_ANALYSIS_SYSTEM};
use crate::analysis::records::CvAnalysis;
use crate::live::{channel_name, EntityKind, LivePublisher, LiveUpdate};
use crate::models::CvRow;
use crate::store::AnalysisStore;

const SCHEMA_NAME: &str = "cv_analysis";

/// Streams a CV through the model, publishing partial results, then persists
/// the final analysis and publishes the CV panel.
pub struct CvAnalyzer {
    model: Arc<dyn AnalysisModel>,
    store: Arc<dyn AnalysisStore>,
    publisher: Arc<dyn LivePublisher>,
}

impl CvAnalyzer {
    pub fn new(
        model: Arc<dyn AnalysisModel>,
        store: Arc<dyn AnalysisStore>,
        publisher: Arc<dyn LivePublisher>,
    ) -> Self {
        Self {
            model,
            store,
            publisher,
        }
    }

    /// Runs one analysis.
    ///
    /// Only a failed lookup returns `Err`; nothing is broadcast in that case.
    /// Every later failure is published on the CV's channel and reported as
    /// [`AnalysisOutcome::Failed`].
    #[instrument(skip(self))]
    pub async fn run(&self, cv_id: Uuid) -> Result<AnalysisOutcome<CvAnalysis>, AnalysisError> {
        let mut stages = StageTracker::new(EntityKind::Cv, cv_id);

        let cv = self
            .store
            .find_cv(cv_id)
            .await
            .map_err(AnalysisError::storage)?
            .ok_or(AnalysisError::NotFound {
                entity: "CV",
                id: cv_id,
            })?;

        let channel = channel_name(EntityKind::Cv, cv_id);

        match self.analyze(&mut stages, cv, &channel).await {
            Ok(analysis) => {
                stages.advance(AnalysisStage::Persisted);
                Ok(AnalysisOutcome::Persisted(analysis))
            }
            Err(err) => {
                let message = err.to_string();
                error!(stage = %stages.stage(), error = %message, "CV analysis failed");
                stages.advance(AnalysisStage::Failed);
                self.publisher.publish(LiveUpdate::error(&channel, &message));
                Ok(AnalysisOutcome::Failed { message })
            }
        }
    }

    async fn analyze(
        &self,
        stages: &mut StageTracker,
        mut cv: CvRow,
        channel: &str,
    ) -> Result<CvAnalysis, AnalysisError> {
        let request = AnalysisRequest {
            system_prompt: CV_ANALYSIS_SYSTEM.to_string(),
            user_prompt: cv_analysis_prompt(&cv.body_text),
            schema: CvAnalysis::schema(),
            schema_name: SCHEMA_NAME,
            temperature: ANALYSIS_TEMPERATURE,
        };

        stages.advance(AnalysisStage::Streaming);
        let mut session = StreamSession::<CvAnalysis>::new(channel, self.publisher.as_ref());
        let message = self
            .model
            .run(&request, &mut |chunk: &str| session.on_chunk(chunk))
            .await?;
        debug!(
            pushes = session.pushes(),
            input_tokens = ?message.usage.input_tokens,
            output_tokens = ?message.usage.output_tokens,
            "CV stream finished"
        );
        let buffer = session.into_buffer();

        stages.advance(AnalysisStage::Finalizing);
        let analysis = finalize::<CvAnalysis>(message.content, &buffer)?;
        if !analysis.has_content() {
            warn!("CV analysis has no content; it will be reported as unavailable");
        }

        let analyzed_at = Utc::now();
        self.store
            .save_cv_analysis(cv.id, &analysis, analyzed_at)
            .await
            .map_err(AnalysisError::storage)?;
        info!("CV analysis saved");

        cv.apply_analysis(&analysis, analyzed_at);
        match serde_json::to_value(CvPanel::from(&cv)) {
            Ok(panel) => self.publisher.publish(LiveUpdate::panel(channel, panel)),
            Err(e) => warn!(error = %e, "Could not render CV panel"),
        }

        Ok(analysis)
    }
}
