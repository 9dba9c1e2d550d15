pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::analysis::handlers;
use crate::live::ws;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // CV analysis
        .route("/api/v1/cvs/:id/analyze", post(handlers::handle_analyze_cv))
        .route(
            "/api/v1/cvs/:id/analysis",
            get(handlers::handle_get_cv_analysis),
        )
        // Job offer analysis
        .route(
            "/api/v1/job_offers/:id/analyze",
            post(handlers::handle_analyze_offer),
        )
        .route(
            "/api/v1/job_offers/:id/analysis",
            get(handlers::handle_get_offer_analysis),
        )
        // Live updates
        .route("/api/v1/live/:channel", get(ws::handle_live_socket))
        .with_state(state)
}
