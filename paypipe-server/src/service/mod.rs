//! Service Module
//!
//! The pipeline engine: planning, budget control, step execution,
//! orchestration and event fan-out.

pub mod broadcaster;
pub mod executor;
pub mod interpolation;
pub mod ledger;
pub mod orchestrator;
pub mod planner;

#[cfg(test)]
pub(crate) mod testing;

pub use broadcaster::{EventBroadcaster, EventSubscription};
pub use ledger::{LedgerError, SpendLedger};
pub use orchestrator::{Orchestrator, OrchestratorSettings, PipelineRequest};
