//! Pipeline API Handlers
//!
//! HTTP endpoints for starting, inspecting and previewing pipeline runs.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use paypipe_core::domain::pipeline::{HistoryEntry, RunStatus};
use paypipe_core::dto::pipeline::{HistoryQuery, PlanPreview, PreviewPlan, RunAccepted, RunPipeline};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::service::PipelineRequest;

const DEFAULT_HISTORY_LIMIT: usize = 20;

fn validate_query(query: &str) -> ApiResult<()> {
    if query.trim().is_empty() {
        return Err(ApiError::BadRequest("query cannot be empty".to_string()));
    }
    Ok(())
}

/// POST /pipeline/run
/// Start a run; it proceeds in the background
pub async fn run_pipeline(
    State(state): State<AppState>,
    Json(req): Json<RunPipeline>,
) -> ApiResult<(StatusCode, Json<RunAccepted>)> {
    validate_query(&req.query)?;
    tracing::info!("Starting pipeline for query: {}", req.query);

    let pipeline_id = state.orchestrator.start(PipelineRequest {
        query: req.query.trim().to_string(),
        budget: req.budget,
        max_steps: req.max_steps,
        plan: None,
    });

    Ok((StatusCode::ACCEPTED, Json(RunAccepted { pipeline_id })))
}

/// GET /pipeline/{id}
/// Live status of a run
pub async fn get_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RunStatus>> {
    tracing::debug!("Getting pipeline: {}", id);

    let status = state
        .orchestrator
        .runs()
        .find_by_id(id)
        .ok_or_else(|| ApiError::NotFound(format!("Pipeline {} not found", id)))?;

    Ok(Json(status))
}

/// POST /pipeline/preview
/// Plan a query without executing it
pub async fn preview_pipeline(
    State(state): State<AppState>,
    Json(req): Json<PreviewPlan>,
) -> ApiResult<Json<PlanPreview>> {
    validate_query(&req.query)?;
    tracing::debug!("Previewing plan for query: {}", req.query);

    let plan = state
        .orchestrator
        .preview(req.query.trim(), req.budget, req.max_steps)
        .await
        .ok_or_else(|| {
            ApiError::Unprocessable("could not create a plan for this query".to_string())
        })?;

    Ok(Json(PlanPreview {
        estimated_total_cost: plan.estimated_total_cost,
        plan,
    }))
}

/// GET /pipeline/history
/// Most recent finished runs, newest first
pub async fn pipeline_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<HistoryEntry>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Json(state.orchestrator.history().recent(limit))
}
