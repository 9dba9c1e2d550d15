//! Background analysis runs.
//!
//! Each trigger spawns one independent task. There is no per-entity locking:
//! two runs for the same entity may overlap and their live updates interleave,
//! though each run keeps its own order. A supervising task awaits the run so
//! a panic is logged instead of vanishing with the task.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analysis::cv_analyzer::CvAnalyzer;
use crate::analysis::error::AnalysisError;
use crate::analysis::offer_analyzer::OfferAnalyzer;
use crate::analysis::pipeline::AnalysisOutcome;

pub fn spawn_cv_analysis(analyzer: Arc<CvAnalyzer>, cv_id: Uuid) -> JoinHandle<()> {
    supervise("cv_analysis", cv_id, async move {
        report("cv_analysis", cv_id, analyzer.run(cv_id).await);
    })
}

pub fn spawn_offer_analysis(
    analyzer: Arc<OfferAnalyzer>,
    offer_id: Uuid,
    mode: Option<String>,
) -> JoinHandle<()> {
    supervise("offer_analysis", offer_id, async move {
        report(
            "offer_analysis",
            offer_id,
            analyzer.run(offer_id, mode.as_deref()).await,
        );
    })
}

fn supervise<F>(job: &'static str, id: Uuid, run: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let task = tokio::spawn(run);
    tokio::spawn(async move {
        if let Err(e) = task.await {
            if e.is_panic() {
                error!(job, %id, "Analysis task panicked");
            } else {
                warn!(job, %id, "Analysis task cancelled");
            }
        }
    })
}

fn report<R>(job: &'static str, id: Uuid, result: Result<AnalysisOutcome<R>, AnalysisError>) {
    match result {
        Ok(AnalysisOutcome::Persisted(_)) => info!(job, %id, "Analysis job finished"),
        Ok(AnalysisOutcome::Failed { message }) => {
            warn!(job, %id, %message, "Analysis job finished with a reported failure")
        }
        // Only a failed lookup reaches here; nothing was broadcast.
        Err(e) => info!(job, %id, error = %e, "Analysis job aborted"),
    }
}
