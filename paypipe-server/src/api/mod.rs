//! API Module
//!
//! HTTP and WebSocket layer of the server.
//! Each submodule handles endpoints for a specific domain.

pub mod catalog;
pub mod error;
pub mod health;
pub mod pipeline;
pub mod spend;
pub mod ws;

use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::service::Orchestrator;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Pipeline endpoints
        .route("/pipeline/run", post(pipeline::run_pipeline))
        .route("/pipeline/preview", post(pipeline::preview_pipeline))
        .route("/pipeline/history", get(pipeline::pipeline_history))
        .route("/pipeline/{id}", get(pipeline::get_pipeline))
        // Catalog endpoints
        .route("/services", get(catalog::list_services))
        .route("/services/search", get(catalog::search_services))
        // Spend endpoints
        .route("/spend", get(spend::spend_summary))
        .route("/spend/limits", put(spend::update_limits))
        // Live events
        .route("/ws", get(ws::events_ws))
        // Add state and middleware
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    use crate::provider::{MockContentGenerator, MockPaymentProvider, StaticCatalog};
    use crate::service::{OrchestratorSettings, SpendLedger};
    use paypipe_core::domain::spend::SpendLimits;

    let content = Arc::new(MockContentGenerator::new());
    let orchestrator = Orchestrator::new(
        Arc::new(StaticCatalog::fallback("testnet")),
        Arc::new(MockPaymentProvider::new(content.clone())),
        content,
        SpendLedger::new(SpendLimits::default()),
        OrchestratorSettings::default(),
    );
    AppState {
        orchestrator: Arc::new(orchestrator),
    }
}
