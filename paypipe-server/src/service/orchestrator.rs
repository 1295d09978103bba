//! Pipeline Orchestrator
//!
//! Drives a run from query to result: plan, reserve budget, execute steps in
//! order, publish progress and record the outcome.
//!
//! Each run owns its `ExecutionContext`; nothing about an in-flight run is
//! shared except through the run store, the ledger and the event stream.

use chrono::Utc;
use paypipe_core::domain::event::PipelineEventKind;
use paypipe_core::domain::pipeline::{
    HistoryEntry, PipelineResult, RunState, RunStatus, StepResult, StepState, StepStatus,
};
use paypipe_core::domain::plan::{PlanStep, TaskPlan};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::provider::{ContentGenerator, PaymentProvider, ServiceCatalog, ServiceIndex};
use crate::repository::{HistoryLog, RunStore};
use crate::service::broadcaster::EventBroadcaster;
use crate::service::executor::{ExecutionContext, StepExecutor};
use crate::service::interpolation::interpolate_str;
use crate::service::ledger::{Reservation, SpendLedger};
use crate::service::planner::PlanBuilder;

const NO_PLAN: &str = "could not create a plan for this query";

/// Tunables for runs and the state the orchestrator owns
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub default_budget: u64,
    pub max_steps: usize,
    pub payment_timeout: Duration,
    pub history_capacity: usize,
    pub event_capacity: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            default_budget: 100_000,
            max_steps: 5,
            payment_timeout: Duration::from_secs(30),
            history_capacity: 50,
            event_capacity: 256,
        }
    }
}

/// What to run
#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    pub query: String,
    pub budget: Option<u64>,
    pub max_steps: Option<usize>,
    /// Skip planning and execute this plan as given
    pub plan: Option<TaskPlan>,
}

impl PipelineRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

pub struct Orchestrator {
    catalog: Arc<dyn ServiceCatalog>,
    planner: PlanBuilder,
    executor: StepExecutor,
    ledger: SpendLedger,
    events: EventBroadcaster,
    history: HistoryLog,
    runs: RunStore,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<dyn ServiceCatalog>,
        payment: Arc<dyn PaymentProvider>,
        content: Arc<dyn ContentGenerator>,
        ledger: SpendLedger,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            catalog,
            planner: PlanBuilder::new(content),
            executor: StepExecutor::new(payment, ledger.clone(), settings.payment_timeout),
            ledger,
            events: EventBroadcaster::new(settings.event_capacity),
            history: HistoryLog::new(settings.history_capacity),
            runs: RunStore::new(settings.history_capacity),
            settings,
        }
    }

    pub fn catalog(&self) -> &Arc<dyn ServiceCatalog> {
        &self.catalog
    }

    pub fn ledger(&self) -> &SpendLedger {
        &self.ledger
    }

    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn runs(&self) -> &RunStore {
        &self.runs
    }

    /// Registers a run and spawns it, returning its id immediately
    pub fn start(self: &Arc<Self>, request: PipelineRequest) -> Uuid {
        let run = self.prepare(request);
        let id = run.id;
        let orchestrator = Arc::clone(self);

        tokio::spawn(async move {
            PipelineRun::new(&orchestrator, id, run.request).execute().await;
        });

        id
    }

    /// Runs a pipeline to completion
    pub async fn run(&self, request: PipelineRequest) -> PipelineResult {
        let run = self.prepare(request);
        PipelineRun::new(self, run.id, run.request).execute().await
    }

    /// Plans without executing
    pub async fn preview(
        &self,
        query: &str,
        budget: Option<u64>,
        max_steps: Option<usize>,
    ) -> Option<TaskPlan> {
        let services = self.catalog.all().await;
        self.planner
            .build(
                query,
                &services,
                budget.unwrap_or(self.settings.default_budget),
                self.step_ceiling(max_steps),
            )
            .await
    }

    /// A request may ask for fewer steps than configured, never more
    fn step_ceiling(&self, requested: Option<usize>) -> usize {
        requested.map_or(self.settings.max_steps, |n| n.min(self.settings.max_steps))
    }

    fn prepare(&self, request: PipelineRequest) -> Prepared {
        let id = Uuid::new_v4();
        self.runs.insert(RunStatus::new(id, request.query.clone()));
        Prepared { id, request }
    }
}

struct Prepared {
    id: Uuid,
    request: PipelineRequest,
}

/// One execution of one request
///
/// Consumed by [`PipelineRun::execute`], so a run can only happen once.
pub struct PipelineRun<'a> {
    orchestrator: &'a Orchestrator,
    id: Uuid,
    request: PipelineRequest,
    context: ExecutionContext,
    started_at: chrono::DateTime<Utc>,
    clock: Instant,
}

impl<'a> PipelineRun<'a> {
    fn new(orchestrator: &'a Orchestrator, id: Uuid, request: PipelineRequest) -> Self {
        let context = ExecutionContext::new(id, request.query.clone());
        Self {
            orchestrator,
            id,
            request,
            context,
            started_at: Utc::now(),
            clock: Instant::now(),
        }
    }

    pub async fn execute(mut self) -> PipelineResult {
        let o = self.orchestrator;
        info!("[{}] Pipeline started: {}", self.id, self.request.query);
        self.publish(PipelineEventKind::Started {
            query: self.request.query.clone(),
        });
        self.set_state(RunState::Planning);

        let services = o.catalog.all().await;
        self.publish(PipelineEventKind::Planning {
            service_count: services.len(),
        });

        let plan = match self.request.plan.take() {
            Some(plan) => Some(plan),
            None => {
                o.planner
                    .build(
                        &self.request.query,
                        &services,
                        self.request.budget.unwrap_or(o.settings.default_budget),
                        o.step_ceiling(self.request.max_steps),
                    )
                    .await
            }
        };
        let Some(plan) = plan else {
            return self.finish(None, Err(NO_PLAN.to_string()));
        };

        let mut reservation = match o.ledger.reserve(primary_cost(&plan.steps)) {
            Ok(reservation) => reservation,
            Err(e) => {
                warn!("[{}] Budget check refused the plan: {}", self.id, e);
                return self.finish(Some(plan), Err(e.to_string()));
            }
        };

        info!(
            "[{}] Planned {} step(s), estimated cost {}",
            self.id,
            plan.steps.len(),
            plan.estimated_total_cost
        );
        self.publish(PipelineEventKind::Planned { plan: plan.clone() });
        self.update_status(|status| {
            status.state = RunState::Running;
            status.plan = Some(plan.clone());
            status.steps = plan.steps.iter().map(pending_status).collect();
        });

        let outcome = self.run_steps(&plan, &mut reservation).await;
        drop(reservation);

        let outcome = outcome.map(|()| self.final_output(&plan));
        self.finish(Some(plan), outcome)
    }

    /// Executes steps in order; `Err` carries the error of the required step that aborted
    async fn run_steps(
        &mut self,
        plan: &TaskPlan,
        reservation: &mut Reservation,
    ) -> Result<(), String> {
        let o = self.orchestrator;
        let index = ServiceIndex::new(&o.catalog.all().await);
        let total = plan.steps.len();

        for (i, step) in plan.steps.iter().enumerate() {
            self.publish(PipelineEventKind::StepStarted {
                step_id: step.id.clone(),
                index: i,
                total,
                service_id: step.service_id.clone(),
                description: step.description.clone(),
            });
            self.update_step(i, |s| s.state = StepState::Running);

            let result = o.executor.execute(step, &index, &self.context).await;
            reservation.settle(primary_cost(std::slice::from_ref(step)));
            self.report_step(i, step, &result);

            let failure = (!result.success).then(|| result.error.clone().unwrap_or_default());
            self.context.record(i, result);

            if let Some(error) = failure {
                if step.required {
                    error!("[{}] Required step {} failed: {}", self.id, step.id, error);
                    self.mark_skipped(i + 1);
                    return Err(error);
                }
                warn!("[{}] Optional step {} failed: {}", self.id, step.id, error);
            }
        }

        Ok(())
    }

    fn report_step(&self, index: usize, step: &PlanStep, result: &StepResult) {
        let cost = result.cost;
        let tx_id = result.payment.as_ref().map(|p| p.tx_id.clone());
        let error = result.error.clone();
        let success = result.success;
        self.update_status(|status| {
            status.total_cost += cost;
            if let Some(s) = status.steps.get_mut(index) {
                s.state = if success {
                    StepState::Succeeded
                } else {
                    StepState::Failed
                };
                s.cost = cost;
                s.tx_id = tx_id;
                s.error = error;
            }
        });

        if result.success {
            self.publish(PipelineEventKind::StepCompleted {
                step_id: step.id.clone(),
                index,
                payment: result.payment.clone(),
                output: result.output.clone(),
                cost: result.cost,
                duration_ms: result.duration_ms,
            });
        } else {
            self.publish(PipelineEventKind::StepFailed {
                step_id: step.id.clone(),
                index,
                required: step.required,
                error: result.error.clone().unwrap_or_default(),
            });
        }
    }

    /// Interpolated output template, else the last successful step's data
    fn final_output(&self, plan: &TaskPlan) -> Option<JsonValue> {
        match &plan.output_template {
            Some(template) => Some(JsonValue::String(interpolate_str(
                template,
                &self.context.variables,
            ))),
            None => self.context.last_success_data().cloned(),
        }
    }

    /// Records the terminal state everywhere and builds the result
    fn finish(
        self,
        plan: Option<TaskPlan>,
        outcome: Result<Option<JsonValue>, String>,
    ) -> PipelineResult {
        let o = self.orchestrator;
        let duration_ms = self.clock.elapsed().as_millis() as u64;
        let total_cost = self.context.total_cost;
        let (final_output, error) = match outcome {
            Ok(output) => (output, None),
            Err(e) => (None, Some(e)),
        };

        let result = PipelineResult {
            pipeline_id: self.id,
            query: self.request.query.clone(),
            success: error.is_none(),
            plan,
            steps: self.context.results.clone(),
            final_output,
            total_cost,
            started_at: self.started_at,
            completed_at: Utc::now(),
            duration_ms,
            error,
        };

        o.history.add_entry(HistoryEntry::from(&result));
        o.runs.update(self.id, |status| {
            status.state = if result.success {
                RunState::Complete
            } else {
                RunState::Failed
            };
            if status.plan.is_none() {
                status.plan = result.plan.clone();
            }
            status.total_cost = total_cost;
            status.completed_at = Some(result.completed_at);
            status.duration_ms = duration_ms;
            status.error = result.error.clone();
        });
        o.runs.mark_finished(self.id);

        match &result.error {
            None => {
                info!(
                    "[{}] Pipeline complete: {} step(s), cost {}, {}ms",
                    self.id,
                    result.steps.len(),
                    total_cost,
                    duration_ms
                );
                self.publish(PipelineEventKind::Completed {
                    total_cost,
                    duration_ms,
                    final_output: result.final_output.clone(),
                });
            }
            Some(error) => {
                error!("[{}] Pipeline failed: {}", self.id, error);
                self.publish(PipelineEventKind::Failed {
                    error: error.clone(),
                    total_cost,
                    duration_ms,
                });
            }
        }

        result
    }

    fn publish(&self, kind: PipelineEventKind) {
        self.orchestrator.events.publish(self.id, kind);
    }

    /// Applies `f` to this run's status and refreshes its running duration
    fn update_status(&self, f: impl FnOnce(&mut RunStatus)) {
        let elapsed_ms = self.clock.elapsed().as_millis() as u64;
        self.orchestrator.runs.update(self.id, |status| {
            f(status);
            status.duration_ms = elapsed_ms;
        });
    }

    fn set_state(&self, state: RunState) {
        self.update_status(|s| s.state = state);
    }

    fn update_step(&self, index: usize, f: impl FnOnce(&mut StepStatus)) {
        self.update_status(|status| {
            if let Some(step) = status.steps.get_mut(index) {
                f(step);
            }
        });
    }

    fn mark_skipped(&self, from: usize) {
        self.update_status(|status| {
            for step in status.steps.iter_mut().skip(from) {
                step.state = StepState::Skipped;
            }
        });
    }
}

fn pending_status(step: &PlanStep) -> StepStatus {
    StepStatus {
        step_id: step.id.clone(),
        description: step.description.clone(),
        service_id: step.service_id.clone(),
        state: StepState::Pending,
        cost: 0,
        tx_id: None,
        error: None,
    }
}

/// Estimated cost of `steps` in the asset spend ceilings apply to
fn primary_cost(steps: &[PlanStep]) -> u64 {
    steps
        .iter()
        .filter(|s| s.asset.is_primary())
        .map(|s| s.estimated_cost)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockContentGenerator, PaymentError, StaticCatalog, fallback_services};
    use crate::service::testing::{FakePayments, Reply, service};
    use paypipe_core::domain::event::PipelineEvent;
    use paypipe_core::domain::plan::PlanStrategy;
    use paypipe_core::domain::service::{Asset, ServiceCategory, ServiceDescriptor};
    use paypipe_core::domain::spend::SpendLimits;
    use serde_json::json;

    fn orchestrator(
        services: Vec<ServiceDescriptor>,
        payments: FakePayments,
        limits: SpendLimits,
    ) -> (Arc<Orchestrator>, Arc<FakePayments>) {
        orchestrator_with(services, payments, limits, OrchestratorSettings::default())
    }

    fn orchestrator_with(
        services: Vec<ServiceDescriptor>,
        payments: FakePayments,
        limits: SpendLimits,
        settings: OrchestratorSettings,
    ) -> (Arc<Orchestrator>, Arc<FakePayments>) {
        let payments = Arc::new(payments);
        let orchestrator = Orchestrator::new(
            Arc::new(StaticCatalog::new(services)),
            payments.clone(),
            Arc::new(MockContentGenerator::new()),
            SpendLedger::new(limits),
            settings,
        );
        (Arc::new(orchestrator), payments)
    }

    fn three_services() -> Vec<ServiceDescriptor> {
        vec![
            service("a", ServiceCategory::Market, 100),
            service("b", ServiceCategory::Ai, 200),
            service("c", ServiceCategory::Generation, 300),
        ]
    }

    fn plan(required: [bool; 3], output_template: Option<&str>) -> TaskPlan {
        let steps: Vec<PlanStep> = ["a", "b", "c"]
            .iter()
            .zip(required)
            .zip([100, 200, 300])
            .enumerate()
            .map(|(i, ((id, required), cost))| PlanStep {
                id: format!("step{}", i + 1),
                description: format!("Call {}", id),
                service_id: id.to_string(),
                request: Some(if i == 0 {
                    json!({ "query": "q" })
                } else {
                    json!({ "query": "q", "input": "{{lastResult}}" })
                }),
                required,
                estimated_cost: cost,
                asset: Asset::Stx,
            })
            .collect();

        TaskPlan {
            query: "q".to_string(),
            description: "test plan".to_string(),
            estimated_total_cost: 600,
            steps,
            output_template: output_template.map(str::to_string),
            strategy: PlanStrategy::Keyword,
        }
    }

    fn with_plan(plan: TaskPlan) -> PipelineRequest {
        PipelineRequest {
            plan: Some(plan),
            ..PipelineRequest::new("q")
        }
    }

    async fn drain(sub: &mut crate::service::broadcaster::EventSubscription) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Some(event) = sub.next().await {
            let terminal = matches!(
                event.kind,
                PipelineEventKind::Completed { .. } | PipelineEventKind::Failed { .. }
            );
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }

    #[tokio::test]
    async fn test_single_market_service_run() {
        let payments = FakePayments::new().with(
            "btc-price",
            Reply::Data(json!({ "type": "price", "symbol": "BTC", "price": 97000.0 })),
        );
        let (o, _) = orchestrator(
            vec![service("btc-price", ServiceCategory::Market, 500)],
            payments,
            SpendLimits::default(),
        );

        let mut request = PipelineRequest::new("Get BTC price");
        request.budget = Some(100_000);
        let result = o.run(request).await;

        assert!(result.success);
        assert_eq!(result.total_cost, 500);
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.final_output.unwrap()["symbol"], "BTC");

        let status = o.runs().find_by_id(result.pipeline_id).unwrap();
        assert_eq!(status.state, RunState::Complete);
        assert_eq!(status.steps[0].state, StepState::Succeeded);
        assert_eq!(o.history().len(), 1);
        assert_eq!(o.ledger().today_spent(), 500);
    }

    #[tokio::test]
    async fn test_events_follow_step_order() {
        let (o, _) = orchestrator(three_services(), FakePayments::new(), SpendLimits::default());
        let mut sub = o.events().subscribe();

        let result = o.run(with_plan(plan([true, true, true], None))).await;
        let events = drain(&mut sub).await;

        assert!(events.iter().all(|e| e.pipeline_id == result.pipeline_id));
        let names: Vec<&str> = events.iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec![
                "pipeline:started",
                "pipeline:planning",
                "pipeline:planned",
                "pipeline:step:started",
                "pipeline:step:completed",
                "pipeline:step:started",
                "pipeline:step:completed",
                "pipeline:step:started",
                "pipeline:step:completed",
                "pipeline:completed",
            ]
        );

        let started: Vec<usize> = events
            .iter()
            .filter_map(|e| match &e.kind {
                PipelineEventKind::StepStarted { index, total, .. } => {
                    assert_eq!(*total, 3);
                    Some(*index)
                }
                _ => None,
            })
            .collect();
        assert_eq!(started, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_required_failure_aborts_and_keeps_spend() {
        let payments =
            FakePayments::new().with("b", Reply::Error(PaymentError::InsufficientBalance));
        let (o, payments) = orchestrator(three_services(), payments, SpendLimits::default());
        let mut sub = o.events().subscribe();

        let result = o.run(with_plan(plan([true, true, true], None))).await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("insufficient balance"));
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.total_cost, 100);
        assert_eq!(payments.called_services(), vec!["a", "b"]);
        assert_eq!(o.ledger().today_spent(), 100);
        assert_eq!(o.ledger().summary().reserved, 0);

        let status = o.runs().find_by_id(result.pipeline_id).unwrap();
        assert_eq!(status.state, RunState::Failed);
        let states: Vec<StepState> = status.steps.iter().map(|s| s.state).collect();
        assert_eq!(
            states,
            vec![StepState::Succeeded, StepState::Failed, StepState::Skipped]
        );

        let events = drain(&mut sub).await;
        assert!(
            !events
                .iter()
                .any(|e| matches!(&e.kind, PipelineEventKind::StepStarted { index: 2, .. }))
        );
        assert_eq!(events.last().unwrap().name(), "pipeline:failed");

        let entry = &o.history().recent(1)[0];
        assert!(!entry.success);
        assert_eq!(entry.error.as_deref(), Some("insufficient balance"));
    }

    #[tokio::test]
    async fn test_optional_failure_continues() {
        let payments = FakePayments::new().with(
            "b",
            Reply::Data(json!({ "success": false, "error": "model overloaded" })),
        );
        let (o, payments) = orchestrator(three_services(), payments, SpendLimits::default());

        let result = o.run(with_plan(plan([true, false, true], None))).await;

        assert!(result.success);
        assert_eq!(result.steps.len(), 3);
        assert!(!result.steps[1].success);
        assert_eq!(payments.called_services(), vec!["a", "b", "c"]);
        // the failed step was still paid for
        assert_eq!(result.total_cost, 600);
        assert_eq!(o.ledger().today_spent(), 600);
    }

    #[tokio::test]
    async fn test_daily_ceiling_stops_second_run_before_payment() {
        let (o, payments) = orchestrator(
            vec![service("btc-price", ServiceCategory::Market, 1_000)],
            FakePayments::new(),
            SpendLimits {
                max_per_task: 1_000,
                max_per_day: 1_500,
            },
        );

        let first = o.run(PipelineRequest::new("bitcoin price")).await;
        assert!(first.success);

        let second = o.run(PipelineRequest::new("bitcoin price")).await;
        assert!(!second.success);
        assert!(second.error.unwrap().contains("daily limit"));
        assert!(second.steps.is_empty());
        assert!(second.plan.is_some());
        assert_eq!(payments.calls().len(), 1);
        assert_eq!(o.ledger().today_spent(), 1_000);
    }

    #[tokio::test]
    async fn test_previous_result_flows_into_next_request() {
        let payments = FakePayments::new().with("a", Reply::Data(json!({ "price": 100 })));
        let (o, payments) = orchestrator(three_services(), payments, SpendLimits::default());

        let result = o
            .run(with_plan(plan([true, true, true], Some("Price was {{step1}}"))))
            .await;

        let calls = payments.calls();
        assert_eq!(calls[1].1["input"], "{\"price\":100}");
        assert_eq!(result.final_output, Some(json!("Price was {\"price\":100}")));
    }

    #[tokio::test]
    async fn test_no_plan_fails_run() {
        let (o, payments) = orchestrator(Vec::new(), FakePayments::new(), SpendLimits::default());
        let mut sub = o.events().subscribe();

        let result = o.run(PipelineRequest::new("anything")).await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some(NO_PLAN));
        assert!(result.plan.is_none());
        assert!(payments.calls().is_empty());
        assert_eq!(o.history().len(), 1);

        let names: Vec<&str> = drain(&mut sub).await.iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec!["pipeline:started", "pipeline:planning", "pipeline:failed"]
        );
    }

    #[tokio::test]
    async fn test_start_returns_before_completion() {
        let (o, _) = orchestrator(three_services(), FakePayments::new(), SpendLimits::default());
        let mut sub = o.events().subscribe();

        let id = o.start(with_plan(plan([true, true, true], None)));
        assert!(o.runs().find_by_id(id).is_some());

        let events = drain(&mut sub).await;
        assert_eq!(events.last().unwrap().name(), "pipeline:completed");

        let status = o.runs().find_by_id(id).unwrap();
        assert_eq!(status.state, RunState::Complete);
        assert_eq!(status.total_cost, 600);
        assert!(status.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_preview_does_not_pay() {
        let (o, payments) = orchestrator(
            vec![service("btc-price", ServiceCategory::Market, 500)],
            FakePayments::new(),
            SpendLimits::default(),
        );

        let plan = o.preview("bitcoin price", None, None).await.unwrap();
        assert_eq!(plan.service_ids(), vec!["btc-price"]);
        assert!(o.preview("bitcoin price", Some(100), None).await.is_none());
        assert!(payments.calls().is_empty());
        assert!(o.runs().is_empty());
    }

    #[tokio::test]
    async fn test_requested_steps_capped_by_configured_ceiling() {
        let (o, _) = orchestrator(
            fallback_services("testnet"),
            FakePayments::new(),
            SpendLimits::default(),
        );
        let query = "onchain volume text markdown social digest";

        let mut request = PipelineRequest::new(query);
        request.max_steps = Some(50);
        let result = o.run(request).await;
        let plan = result.plan.unwrap();
        assert!(!plan.steps.is_empty());
        assert!(plan.steps.len() <= 5);
        assert!(result.steps.len() <= 5);

        let preview = o.preview(query, None, Some(50)).await.unwrap();
        assert!(preview.steps.len() <= 5);

        let preview = o.preview(query, None, Some(2)).await.unwrap();
        assert!(preview.steps.len() <= 2);
    }

    #[tokio::test]
    async fn test_finished_runs_retained_up_to_history_capacity() {
        let settings = OrchestratorSettings {
            history_capacity: 10,
            ..OrchestratorSettings::default()
        };
        let (o, _) = orchestrator_with(
            vec![service("btc-price", ServiceCategory::Market, 10)],
            FakePayments::new(),
            SpendLimits::default(),
            settings,
        );

        let mut ids = Vec::new();
        for _ in 0..25 {
            ids.push(o.run(PipelineRequest::new("bitcoin price")).await.pipeline_id);
        }

        assert_eq!(o.runs().len(), 10);
        assert_eq!(o.history().len(), 10);
        assert!(o.runs().find_by_id(ids[0]).is_none());
        assert!(o.runs().find_by_id(ids[24]).is_some());
    }

    #[tokio::test]
    async fn test_status_duration_advances_while_running() {
        let payments = FakePayments::new()
            .with("a", Reply::Hang)
            .with("b", Reply::Hang);
        let settings = OrchestratorSettings {
            payment_timeout: Duration::from_millis(100),
            ..OrchestratorSettings::default()
        };
        let (o, _) = orchestrator_with(three_services(), payments, SpendLimits::default(), settings);
        let mut sub = o.events().subscribe();

        let id = o.start(with_plan(plan([false, true, true], None)));

        loop {
            let event = sub.next().await.unwrap();
            if matches!(event.kind, PipelineEventKind::StepFailed { index: 0, .. }) {
                break;
            }
        }

        let status = o.runs().find_by_id(id).unwrap();
        assert_eq!(status.state, RunState::Running);
        assert!(status.completed_at.is_none());
        assert!(status.duration_ms >= 100);

        let events = drain(&mut sub).await;
        assert_eq!(events.last().unwrap().name(), "pipeline:failed");
    }
}
