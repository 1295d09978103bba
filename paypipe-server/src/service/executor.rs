//! Step Executor
//!
//! Runs exactly one plan step: resolve the service, interpolate the request,
//! pay for the call, record the spend and type the response. Every outcome,
//! including failures, comes back as a `StepResult`.

use chrono::Utc;
use paypipe_core::domain::pipeline::{Headline, PaymentOutcome, ServiceOutput, StepResult};
use paypipe_core::domain::plan::PlanStep;
use paypipe_core::domain::service::{ServiceCategory, ServiceDescriptor};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::provider::{PaymentProvider, ServiceIndex};
use crate::service::interpolation::{Variables, interpolate};
use crate::service::ledger::SpendLedger;

/// Per-run accumulator, owned by exactly one run
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub pipeline_id: Uuid,
    pub query: String,
    pub variables: Variables,
    pub results: Vec<StepResult>,
    pub total_cost: u64,
}

impl ExecutionContext {
    pub fn new(pipeline_id: Uuid, query: impl Into<String>) -> Self {
        Self {
            pipeline_id,
            query: query.into(),
            variables: Variables::new(),
            results: Vec::new(),
            total_cost: 0,
        }
    }

    /// Appends the result of the step at `index` (zero-based)
    ///
    /// A success exposes its data as `step{index + 1}` and `lastResult`.
    pub fn record(&mut self, index: usize, result: StepResult) {
        self.total_cost += result.cost;
        if result.success {
            let data = result.data.clone().unwrap_or(JsonValue::Null);
            self.variables.insert(format!("step{}", index + 1), data.clone());
            self.variables.insert("lastResult".to_string(), data);
        }
        self.results.push(result);
    }

    /// Data of the most recent successful step
    pub fn last_success_data(&self) -> Option<&JsonValue> {
        self.results
            .iter()
            .rev()
            .find(|r| r.success)
            .and_then(|r| r.data.as_ref())
    }
}

pub struct StepExecutor {
    payment: Arc<dyn PaymentProvider>,
    ledger: SpendLedger,
    timeout: Duration,
}

impl StepExecutor {
    pub fn new(payment: Arc<dyn PaymentProvider>, ledger: SpendLedger, timeout: Duration) -> Self {
        Self {
            payment,
            ledger,
            timeout,
        }
    }

    pub async fn execute(
        &self,
        step: &PlanStep,
        services: &ServiceIndex,
        context: &ExecutionContext,
    ) -> StepResult {
        let mut attempt = Attempt::start(step);

        let Some(service) = services.get(&step.service_id) else {
            warn!("Step {} references unknown service {}", step.id, step.service_id);
            return attempt.fail(format!("service not found: {}", step.service_id));
        };
        attempt.service_name = Some(service.name.clone());

        let payload = match &step.request {
            Some(template) => interpolate(template, &context.variables),
            None => json!({ "query": context.query }),
        };

        info!(
            "[{}] {}: paying {} for {}",
            context.pipeline_id, step.id, service.price, service.id
        );

        let paid = match tokio::time::timeout(self.timeout, self.payment.pay(service, &payload)).await
        {
            Err(_) => {
                return attempt.fail(format!("payment timed out after {:?}", self.timeout));
            }
            Ok(Err(e)) => {
                warn!("[{}] {}: payment failed: {}", context.pipeline_id, step.id, e);
                return attempt.fail(e.to_string());
            }
            Ok(Ok(paid)) => paid,
        };

        self.ledger.record_payment(
            paid.amount,
            paid.asset,
            &service.id,
            &service.name,
            Some(paid.tx_id.clone()),
        );
        attempt.cost = paid.amount;
        attempt.payment = Some(PaymentOutcome {
            tx_id: paid.tx_id,
            amount: paid.amount,
            asset: paid.asset,
        });

        if paid.data.get("success") == Some(&JsonValue::Bool(false)) {
            let error = paid
                .data
                .get("error")
                .and_then(JsonValue::as_str)
                .unwrap_or("service reported a failure")
                .to_string();
            warn!("[{}] {}: {} reported: {}", context.pipeline_id, step.id, service.id, error);
            return attempt.fail(error);
        }

        let output = classify(&paid.data, service);
        debug!("[{}] {}: {}", context.pipeline_id, step.id, output.headline());
        attempt.succeed(paid.data, output)
    }
}

/// Fields of a `StepResult` gathered while a step runs
struct Attempt {
    step_id: String,
    service_id: String,
    service_name: Option<String>,
    payment: Option<PaymentOutcome>,
    cost: u64,
    started_at: chrono::DateTime<Utc>,
    clock: Instant,
}

impl Attempt {
    fn start(step: &PlanStep) -> Self {
        Self {
            step_id: step.id.clone(),
            service_id: step.service_id.clone(),
            service_name: None,
            payment: None,
            cost: 0,
            started_at: Utc::now(),
            clock: Instant::now(),
        }
    }

    fn finish(
        self,
        data: Option<JsonValue>,
        output: Option<ServiceOutput>,
        error: Option<String>,
    ) -> StepResult {
        StepResult {
            step_id: self.step_id,
            success: error.is_none(),
            service_id: self.service_id,
            service_name: self.service_name,
            data,
            output,
            error,
            payment: self.payment,
            cost: self.cost,
            started_at: self.started_at,
            duration_ms: self.clock.elapsed().as_millis() as u64,
        }
    }

    fn fail(self, error: String) -> StepResult {
        self.finish(None, None, Some(error))
    }

    fn succeed(self, data: JsonValue, output: ServiceOutput) -> StepResult {
        self.finish(Some(data), Some(output), None)
    }
}

// ============================================================================
// Output classification
// ============================================================================

/// Types a response payload
///
/// The payload's `type` field decides; without one, market and news services
/// are assumed to return their usual shapes. Anything that doesn't parse is
/// kept as `Generic`.
pub fn classify(data: &JsonValue, service: &ServiceDescriptor) -> ServiceOutput {
    let kind = data
        .get("type")
        .and_then(JsonValue::as_str)
        .or(match service.category {
            ServiceCategory::Market => Some("price"),
            ServiceCategory::News => Some("news"),
            _ => None,
        });

    let text = |key: &str| data.get(key).and_then(JsonValue::as_str).map(str::to_string);

    let typed = match kind {
        Some("price") => data
            .get("price")
            .and_then(JsonValue::as_f64)
            .map(|price| ServiceOutput::Price {
                symbol: text("symbol").unwrap_or_default(),
                price,
                currency: text("currency").unwrap_or_else(|| "USD".to_string()),
                change_24h: data.get("change24h").and_then(JsonValue::as_f64),
            }),
        Some("news") => data
            .get("headlines")
            .cloned()
            .and_then(|h| serde_json::from_value::<Vec<Headline>>(h).ok())
            .map(|headlines| ServiceOutput::News { headlines }),
        Some("sentiment") => match (text("label"), data.get("score").and_then(JsonValue::as_f64)) {
            (Some(label), Some(score)) => Some(ServiceOutput::Sentiment { label, score }),
            _ => None,
        },
        Some("summary") => text("text")
            .or_else(|| text("summary"))
            .map(|text| ServiceOutput::Summary { text }),
        Some("tweet" | "generated_tweet") => {
            text("text").map(|text| ServiceOutput::GeneratedTweet { text })
        }
        Some("report" | "generated_report") => text("body").map(|body| {
            ServiceOutput::GeneratedReport {
                title: text("title").unwrap_or_default(),
                body,
            }
        }),
        Some("translation") => text("text").map(|translated| ServiceOutput::Translation {
            text: translated,
            language: text("language").unwrap_or_default(),
        }),
        _ => None,
    };

    typed.unwrap_or_else(|| ServiceOutput::Generic(data.clone()))
}
