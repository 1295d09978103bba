//! Pipeline run domain types
//!
//! Everything in here is scoped to a single pipeline run. `RunStatus` is the
//! live view while the run is in flight; `PipelineResult` is the durable
//! summary written once it ends, and `HistoryEntry` is its projection kept in
//! the bounded history log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::plan::TaskPlan;
use crate::domain::service::Asset;

/// Lifecycle state of a run
///
/// `Created -> Planning -> Running -> {Complete | Failed}`. Planning may also
/// go straight to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Created,
    Planning,
    Running,
    Complete,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Complete | RunState::Failed)
    }
}

/// Per-step state as seen by status queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

/// One headline from a news service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Headline {
    pub title: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Typed view of a paid service's response payload
///
/// Decided once when a step completes; consumers match on the variant
/// instead of inspecting the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "kind",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServiceOutput {
    Price {
        symbol: String,
        price: f64,
        currency: String,
        change_24h: Option<f64>,
    },
    News {
        headlines: Vec<Headline>,
    },
    Sentiment {
        label: String,
        score: f64,
    },
    Summary {
        text: String,
    },
    GeneratedTweet {
        text: String,
    },
    GeneratedReport {
        title: String,
        body: String,
    },
    Translation {
        text: String,
        language: String,
    },
    Generic(serde_json::Value),
}

impl ServiceOutput {
    /// Short human-readable rendering for logs and CLI output
    pub fn headline(&self) -> String {
        match self {
            ServiceOutput::Price {
                symbol,
                price,
                currency,
                ..
            } => format!("{} = {:.2} {}", symbol, price, currency),
            ServiceOutput::News { headlines } => match headlines.first() {
                Some(first) => format!("{} headline(s), first: {}", headlines.len(), first.title),
                None => "no headlines".to_string(),
            },
            ServiceOutput::Sentiment { label, score } => format!("{} ({:.2})", label, score),
            ServiceOutput::Summary { text }
            | ServiceOutput::GeneratedTweet { text }
            | ServiceOutput::Translation { text, .. } => text.clone(),
            ServiceOutput::GeneratedReport { title, .. } => title.clone(),
            ServiceOutput::Generic(value) => value.to_string(),
        }
    }
}

/// Payment made for one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub tx_id: String,
    pub amount: u64,
    pub asset: Asset,
}

/// Outcome of executing one plan step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_id: String,
    pub success: bool,
    pub service_id: String,
    pub service_name: Option<String>,
    /// Raw response payload, used for interpolation into later steps
    pub data: Option<serde_json::Value>,
    pub output: Option<ServiceOutput>,
    pub error: Option<String>,
    pub payment: Option<PaymentOutcome>,
    /// Amount actually paid; non-zero on a service-reported failure too
    pub cost: u64,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Durable summary of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub pipeline_id: Uuid,
    pub query: String,
    pub success: bool,
    pub plan: Option<TaskPlan>,
    pub steps: Vec<StepResult>,
    pub final_output: Option<serde_json::Value>,
    pub total_cost: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Live status of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepStatus {
    pub step_id: String,
    pub description: String,
    pub service_id: String,
    pub state: StepState,
    pub cost: u64,
    pub tx_id: Option<String>,
    pub error: Option<String>,
}

/// Live status of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatus {
    pub pipeline_id: Uuid,
    pub query: String,
    pub state: RunState,
    pub plan: Option<TaskPlan>,
    pub steps: Vec<StepStatus>,
    pub total_cost: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl RunStatus {
    pub fn new(pipeline_id: Uuid, query: String) -> Self {
        Self {
            pipeline_id,
            query,
            state: RunState::Created,
            plan: None,
            steps: Vec::new(),
            total_cost: 0,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: 0,
            error: None,
        }
    }
}

/// Entry of the bounded history log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub pipeline_id: Uuid,
    pub query: String,
    pub success: bool,
    pub step_count: usize,
    pub succeeded_steps: usize,
    pub services: Vec<String>,
    pub total_cost: u64,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub final_output: Option<serde_json::Value>,
    pub completed_at: DateTime<Utc>,
}

impl From<&PipelineResult> for HistoryEntry {
    fn from(result: &PipelineResult) -> Self {
        Self {
            pipeline_id: result.pipeline_id,
            query: result.query.clone(),
            success: result.success,
            step_count: result.steps.len(),
            succeeded_steps: result.steps.iter().filter(|s| s.success).count(),
            services: result
                .steps
                .iter()
                .map(|s| s.service_name.clone().unwrap_or_else(|| s.service_id.clone()))
                .collect(),
            total_cost: result.total_cost,
            duration_ms: result.duration_ms,
            error: result.error.clone(),
            final_output: result.final_output.clone(),
            completed_at: result.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_output_wire_shape() {
        let output = ServiceOutput::GeneratedTweet {
            text: "gm".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&output).unwrap(),
            json!({ "kind": "generated_tweet", "data": { "text": "gm" } })
        );

        let generic = ServiceOutput::Generic(json!([1, 2]));
        assert_eq!(
            serde_json::to_value(&generic).unwrap(),
            json!({ "kind": "generic", "data": [1, 2] })
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(RunState::Complete.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Running.is_terminal());
        assert!(!RunState::Created.is_terminal());
    }

    #[test]
    fn test_history_entry_projection() {
        let now = Utc::now();
        let step = |id: &str, success: bool| StepResult {
            step_id: id.to_string(),
            success,
            service_id: format!("svc-{}", id),
            service_name: None,
            data: None,
            output: None,
            error: None,
            payment: None,
            cost: 100,
            started_at: now,
            duration_ms: 5,
        };
        let result = PipelineResult {
            pipeline_id: Uuid::new_v4(),
            query: "q".to_string(),
            success: false,
            plan: None,
            steps: vec![step("step1", true), step("step2", false)],
            final_output: None,
            total_cost: 100,
            started_at: now,
            completed_at: now,
            duration_ms: 10,
            error: Some("boom".to_string()),
        };

        let entry = HistoryEntry::from(&result);
        assert_eq!(entry.step_count, 2);
        assert_eq!(entry.succeeded_steps, 1);
        assert_eq!(entry.services, vec!["svc-step1", "svc-step2"]);
        assert_eq!(entry.error.as_deref(), Some("boom"));
    }
}
