//! Spend domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::service::Asset;

/// One payment event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendRecord {
    pub timestamp: DateTime<Utc>,
    pub amount: u64,
    pub asset: Asset,
    pub service_id: String,
    pub service_name: String,
    pub tx_id: Option<String>,
}

/// Budget ceilings, in micro-units of the primary asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendLimits {
    pub max_per_task: u64,
    pub max_per_day: u64,
}

impl Default for SpendLimits {
    fn default() -> Self {
        Self {
            max_per_task: 1_000_000,
            max_per_day: 10_000_000,
        }
    }
}

/// Answer to "can I spend this much"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendCheck {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl SpendCheck {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Spend attributed to one service today
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpend {
    pub service_id: String,
    pub service_name: String,
    pub total: u64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodTotals {
    pub total: u64,
    pub count: usize,
}

/// Ledger summary returned by `GET /spend`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendSummary {
    pub today: PeriodTotals,
    pub by_service: Vec<ServiceSpend>,
    pub all_time: PeriodTotals,
    /// Daily ceiling minus today's spend, floored at zero
    pub remaining_today: u64,
    /// Amount currently held by in-flight runs
    pub reserved: u64,
    pub limits: SpendLimits,
    pub recent: Vec<SpendRecord>,
}
