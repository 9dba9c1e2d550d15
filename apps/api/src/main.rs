mod analysis;
mod config;
mod db;
mod errors;
mod jobs;
mod live;
mod llm_client;
mod models;
mod routes;
mod state;
mod store;
#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::agent_client::AgentClient;
use crate::analysis::cv_analyzer::CvAnalyzer;
use crate::analysis::offer_analyzer::OfferAnalyzer;
use crate::config::Config;
use crate::db::create_pool;
use crate::live::LiveHub;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::PgAnalysisStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing or malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting JobHunt API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    let store = Arc::new(PgAnalysisStore::new(db));

    // Initialize LLM client
    let analysis_config = config.analysis.clone();
    let llm = Arc::new(LlmClient::new(analysis_config.llm.clone())?);
    info!(
        "LLM client initialized (provider: {:?}, model: {})",
        analysis_config.llm.provider,
        llm.model()
    );

    // Remote agent shares the LLM request timeout
    let agent_http = reqwest::Client::builder()
        .timeout(analysis_config.llm.timeout)
        .build()
        .context("Failed to build agent HTTP client")?;
    let agent = Arc::new(AgentClient::new(
        agent_http,
        analysis_config.agent_api_url.clone(),
    ));
    if analysis_config.agent_api_url.is_none() {
        info!("AGENT_API_URL not set; remote offer analysis is unavailable");
    }

    let live = LiveHub::new();
    let publisher = Arc::new(live.clone());

    let cv_analyzer = Arc::new(CvAnalyzer::new(
        llm.clone(),
        store.clone(),
        publisher.clone(),
    ));
    let offer_analyzer = Arc::new(OfferAnalyzer::new(
        llm,
        agent,
        store.clone(),
        publisher,
        analysis_config,
    ));

    // Build app state
    let state = AppState {
        store,
        cv_analyzer,
        offer_analyzer,
        live,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
