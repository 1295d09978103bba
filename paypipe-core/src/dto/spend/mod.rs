//! Spend ledger DTOs

use serde::{Deserialize, Serialize};

/// Request to change the spend ceilings at runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLimits {
    pub max_per_task: Option<u64>,
    pub max_per_day: Option<u64>,
}
