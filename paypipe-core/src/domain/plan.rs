//! Plan domain types

use serde::{Deserialize, Serialize};

use crate::domain::service::Asset;

/// Which planning tier produced a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStrategy {
    Ai,
    Pattern,
    Keyword,
    Cheapest,
}

/// One unit of work in a plan, bound to a single catalog service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    pub id: String,
    pub description: String,
    pub service_id: String,
    /// JSON request body; strings may contain `{{name}}` placeholders
    #[serde(default)]
    pub request: Option<serde_json::Value>,
    #[serde(default = "default_required")]
    pub required: bool,
    pub estimated_cost: u64,
    pub asset: Asset,
}

fn default_required() -> bool {
    true
}

/// Ordered plan for one pipeline run
///
/// Invariants at creation: `steps.len() <= max_steps` and
/// `estimated_total_cost <= max_budget`. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPlan {
    pub query: String,
    pub description: String,
    pub steps: Vec<PlanStep>,
    pub estimated_total_cost: u64,
    #[serde(default)]
    pub output_template: Option<String>,
    pub strategy: PlanStrategy,
}

impl TaskPlan {
    pub fn service_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.service_id.as_str()).collect()
    }
}
