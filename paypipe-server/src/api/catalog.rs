//! Catalog API Handlers

use axum::{
    Json,
    extract::{Query, State},
};
use paypipe_core::domain::service::ServiceDescriptor;
use paypipe_core::dto::service::SearchServices;

use crate::api::AppState;

/// GET /services
pub async fn list_services(State(state): State<AppState>) -> Json<Vec<ServiceDescriptor>> {
    Json(state.orchestrator.catalog().all().await)
}

/// GET /services/search?q=
pub async fn search_services(
    State(state): State<AppState>,
    Query(query): Query<SearchServices>,
) -> Json<Vec<ServiceDescriptor>> {
    tracing::debug!("Searching services: {}", query.q);
    Json(state.orchestrator.catalog().search(&query.q).await)
}
