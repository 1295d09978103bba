//! Pipeline lifecycle events
//!
//! Every event carries the id of the run that emitted it, so subscribers can
//! follow several concurrent runs over one connection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pipeline::{PaymentOutcome, ServiceOutput};
use crate::domain::plan::TaskPlan;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineEvent {
    pub pipeline_id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: PipelineEventKind,
}

impl PipelineEvent {
    pub fn new(pipeline_id: Uuid, kind: PipelineEventKind) -> Self {
        Self {
            pipeline_id,
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all_fields = "camelCase")]
pub enum PipelineEventKind {
    #[serde(rename = "pipeline:started")]
    Started { query: String },

    #[serde(rename = "pipeline:planning")]
    Planning { service_count: usize },

    #[serde(rename = "pipeline:planned")]
    Planned { plan: TaskPlan },

    #[serde(rename = "pipeline:step:started")]
    StepStarted {
        step_id: String,
        index: usize,
        total: usize,
        service_id: String,
        description: String,
    },

    #[serde(rename = "pipeline:step:completed")]
    StepCompleted {
        step_id: String,
        index: usize,
        payment: Option<PaymentOutcome>,
        output: Option<ServiceOutput>,
        cost: u64,
        duration_ms: u64,
    },

    #[serde(rename = "pipeline:step:failed")]
    StepFailed {
        step_id: String,
        index: usize,
        required: bool,
        error: String,
    },

    #[serde(rename = "pipeline:completed")]
    Completed {
        total_cost: u64,
        duration_ms: u64,
        final_output: Option<serde_json::Value>,
    },

    #[serde(rename = "pipeline:failed")]
    Failed {
        error: String,
        total_cost: u64,
        duration_ms: u64,
    },
}

impl PipelineEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEventKind::Started { .. } => "pipeline:started",
            PipelineEventKind::Planning { .. } => "pipeline:planning",
            PipelineEventKind::Planned { .. } => "pipeline:planned",
            PipelineEventKind::StepStarted { .. } => "pipeline:step:started",
            PipelineEventKind::StepCompleted { .. } => "pipeline:step:completed",
            PipelineEventKind::StepFailed { .. } => "pipeline:step:failed",
            PipelineEventKind::Completed { .. } => "pipeline:completed",
            PipelineEventKind::Failed { .. } => "pipeline:failed",
        }
    }
}
