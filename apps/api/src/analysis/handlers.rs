use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::analysis::backend::AnalysisBackend;
use crate::analysis::panel::{CvPanel, OfferPanel};
use crate::errors::AppError;
use crate::jobs::{spawn_cv_analysis, spawn_offer_analysis};
use crate::live::{channel_name, EntityKind};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeOfferRequest {
    /// `rails` | `python`. Omitted means the configured default.
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisQueued {
    pub status: &'static str,
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<AnalysisBackend>,
}

/// POST /api/v1/cvs/:id/analyze
pub async fn handle_analyze_cv(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<AnalysisQueued>), AppError> {
    state
        .store
        .find_cv(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("CV {id}")))?;

    spawn_cv_analysis(state.cv_analyzer.clone(), id);
    info!(cv_id = %id, "CV analysis queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(AnalysisQueued {
            status: "queued",
            channel: channel_name(EntityKind::Cv, id),
            backend: None,
        }),
    ))
}

/// GET /api/v1/cvs/:id/analysis
pub async fn handle_get_cv_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CvPanel>, AppError> {
    let cv = state
        .store
        .find_cv(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("CV {id}")))?;
    Ok(Json(CvPanel::from(&cv)))
}

/// POST /api/v1/job_offers/:id/analyze
///
/// The body is optional and read as JSON whatever its content type. A body
/// that does not parse, or an unknown `mode`, is rejected here; past this
/// point backend selection never fails.
pub async fn handle_analyze_offer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<(StatusCode, Json<AnalysisQueued>), AppError> {
    let mode = requested_mode(&body)?;

    state
        .store
        .find_job_offer(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job offer {id}")))?;

    let backend = state.offer_analyzer.select_backend(mode.as_deref());
    spawn_offer_analysis(state.offer_analyzer.clone(), id, mode);
    info!(job_offer_id = %id, %backend, "Job offer analysis queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(AnalysisQueued {
            status: "queued",
            channel: channel_name(EntityKind::JobOffer, id),
            backend: Some(backend),
        }),
    ))
}

/// Reads `mode` from an optional JSON body. Blank means not given.
fn requested_mode(body: &[u8]) -> Result<Option<String>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let request: AnalyzeOfferRequest = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("invalid request body: {e}")))?;
    let mode = request.mode.filter(|m| !m.trim().is_empty());

    if let Some(mode) = &mode {
        mode.parse::<AnalysisBackend>()
            .map_err(|e| AppError::Validation(e.to_string()))?;
    }
    Ok(mode)
}

/// GET /api/v1/job_offers/:id/analysis
pub async fn handle_get_offer_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OfferPanel>, AppError> {
    let offer = state
        .store
        .find_job_offer(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job offer {id}")))?;
    Ok(Json(OfferPanel::from(&offer)))
}
