//! Pipeline DTOs for the HTTP API

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::plan::TaskPlan;

/// Request to start a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunPipeline {
    pub query: String,
    /// Plan budget in micro-units; server default when absent
    #[serde(default)]
    pub budget: Option<u64>,
    #[serde(default)]
    pub max_steps: Option<usize>,
}

/// Returned immediately when a run is accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAccepted {
    pub pipeline_id: Uuid,
}

/// Request to preview the plan for a query without executing it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewPlan {
    pub query: String,
    #[serde(default)]
    pub budget: Option<u64>,
    #[serde(default)]
    pub max_steps: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanPreview {
    pub plan: TaskPlan,
    pub estimated_total_cost: u64,
}

/// Query string for `GET /pipeline/history`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}
