//! Plan Builder
//!
//! Turns a free-text query into an ordered plan of catalog services.
//!
//! Planning is tiered. A configured language model is asked first; when it
//! is absent, fails, or proposes nothing usable, the heuristic planner takes
//! over: pattern decomposition, then keyword scoring, then the single
//! cheapest service. Every tier honours the same two invariants: at most
//! `max_steps` steps, and an estimated total within `max_budget`.

use paypipe_core::domain::plan::{PlanStep, PlanStrategy, TaskPlan};
use paypipe_core::domain::service::{ServiceCategory, ServiceDescriptor};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use crate::provider::{ContentGenerator, ServiceIndex, extract_json_object};

// ============================================================================
// Scoring policy
// ============================================================================

/// Weights used by the heuristic planner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringPolicy {
    /// Service category equals the detector's category
    pub category_match: u32,
    /// Matched detector keyword found in the service name
    pub pattern_name_hit: u32,
    /// Matched detector keyword found in the service description
    pub pattern_description_hit: u32,
    /// Matched detector keyword found in a service tag
    pub pattern_tag_hit: u32,
    /// Query token found in the service name
    pub keyword_name_hit: u32,
    /// Query token found in the service description
    pub keyword_description_hit: u32,
    /// Query token found in a service tag
    pub keyword_tag_hit: u32,
    /// Shorter query tokens are ignored by keyword scoring
    pub min_token_len: usize,
}

pub const SCORING: ScoringPolicy = ScoringPolicy {
    category_match: 10,
    pattern_name_hit: 5,
    pattern_description_hit: 3,
    pattern_tag_hit: 4,
    keyword_name_hit: 3,
    keyword_description_hit: 2,
    keyword_tag_hit: 2,
    min_token_len: 3,
};

/// Pipeline position of a detected intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Rank {
    Gather = 0,
    Process = 1,
    Produce = 2,
}

struct Detector {
    category: ServiceCategory,
    rank: Rank,
    action: &'static str,
    pattern: Regex,
}

impl Detector {
    fn new(category: ServiceCategory, rank: Rank, action: &'static str, pattern: &str) -> Self {
        Self {
            category,
            rank,
            action,
            pattern: Regex::new(pattern).expect("detector pattern is valid"),
        }
    }

    /// Distinct keywords of this detector present in `query`
    fn matches(&self, query: &str) -> Vec<String> {
        let mut keywords: Vec<String> = Vec::new();
        for m in self.pattern.find_iter(query) {
            let keyword = m.as_str().to_string();
            if !keywords.contains(&keyword) {
                keywords.push(keyword);
            }
        }
        keywords
    }
}

static DETECTORS: LazyLock<Vec<Detector>> = LazyLock::new(|| {
    vec![
        Detector::new(
            ServiceCategory::News,
            Rank::Gather,
            "Gather news",
            r"\b(news|headlines?|articles?|latest|today'?s|breaking|current events)\b",
        ),
        Detector::new(
            ServiceCategory::Market,
            Rank::Gather,
            "Fetch market data",
            r"\b(prices?|bitcoin|btc|stx|eth|crypto|market|stocks?|token)\b",
        ),
        Detector::new(
            ServiceCategory::Ai,
            Rank::Process,
            "Process",
            r"\b(summar\w*|sentiment|analy[sz]\w*|translat\w*|explain|classify)\b",
        ),
        Detector::new(
            ServiceCategory::Generation,
            Rank::Produce,
            "Generate output",
            r"\b(tweet|report|write|generate|compose|draft|post|thread)\b",
        ),
    ]
});

// ============================================================================
// Plan builder
// ============================================================================

/// Builds task plans, asking the content generator before falling back to heuristics
pub struct PlanBuilder {
    content: Arc<dyn ContentGenerator>,
}

impl PlanBuilder {
    pub fn new(content: Arc<dyn ContentGenerator>) -> Self {
        Self { content }
    }

    /// Builds a plan for `query`, or `None` when nothing fits
    ///
    /// # Arguments
    /// * `query` - Free-text request
    /// * `services` - Catalog snapshot to plan against
    /// * `max_budget` - Ceiling for the plan's estimated total
    /// * `max_steps` - Ceiling for the number of steps
    pub async fn build(
        &self,
        query: &str,
        services: &[ServiceDescriptor],
        max_budget: u64,
        max_steps: usize,
    ) -> Option<TaskPlan> {
        if services.is_empty() || max_steps == 0 {
            return None;
        }

        if let Some(plan) = self.ai_plan(query, services, max_budget, max_steps).await {
            info!("AI planner produced {} step(s)", plan.steps.len());
            return Some(plan);
        }

        heuristic_plan(query, services, max_budget, max_steps)
    }

    async fn ai_plan(
        &self,
        query: &str,
        services: &[ServiceDescriptor],
        max_budget: u64,
        max_steps: usize,
    ) -> Option<TaskPlan> {
        let prompt = planning_prompt(query, services, max_budget, max_steps);
        let reply = self.content.complete(&prompt).await?;

        let Some(json) = extract_json_object(&reply) else {
            warn!("AI planner reply contained no JSON object");
            return None;
        };
        let proposal: AiProposal = match serde_json::from_str(json) {
            Ok(proposal) => proposal,
            Err(e) => {
                warn!("AI planner reply was not a valid plan: {}", e);
                return None;
            }
        };
        if let Some(error) = proposal.error {
            debug!("AI planner declined: {}", error);
            return None;
        }

        let index = ServiceIndex::new(services);
        let mut draft = PlanDraft::new(query, max_budget, max_steps);
        for step in proposal.steps {
            if draft.is_full() {
                break;
            }
            let Some(service) = index.get(&step.service_id) else {
                warn!("AI planner proposed unknown service {}", step.service_id);
                continue;
            };
            let description = step
                .description
                .unwrap_or_else(|| format!("Call {}", service.name));
            if !draft.push(service, description, step.required.unwrap_or(true), step.request) {
                debug!("Skipping {}: over budget", service.id);
            }
        }

        let description = proposal
            .description
            .unwrap_or_else(|| format!("AI plan for: {}", query));
        draft.finish(description, proposal.output_template, PlanStrategy::Ai)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AiProposal {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    steps: Vec<AiStep>,
    #[serde(default)]
    output_template: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AiStep {
    service_id: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    required: Option<bool>,
    #[serde(default)]
    request: Option<JsonValue>,
}

fn planning_prompt(
    query: &str,
    services: &[ServiceDescriptor],
    max_budget: u64,
    max_steps: usize,
) -> String {
    let catalog: Vec<String> = services
        .iter()
        .map(|s| {
            format!(
                "- {} ({}, {}, {}): {}",
                s.id,
                s.name,
                s.category.as_str(),
                s.price,
                s.description
            )
        })
        .collect();

    format!(
        "You plan pipelines of paid API calls.\n\n\
         Available services:\n{}\n\n\
         Constraints: at most {} steps, total cost at most {} micro-units.\n\
         Steps run in order. A step's request may reference earlier results with \
         {{{{step1}}}}, {{{{step2}}}} or {{{{lastResult}}}}.\n\n\
         Query: {}\n\n\
         Reply with only a JSON object: \
         {{\"description\": string, \"steps\": [{{\"serviceId\": string, \"description\": string, \
         \"required\": bool, \"request\": object}}], \"outputTemplate\": string?}}. \
         If no services fit, reply {{\"error\": string}}.",
        catalog.join("\n"),
        max_steps,
        max_budget,
        query
    )
}

// ============================================================================
// Heuristic planning
// ============================================================================

/// Plans without a language model
///
/// Tries pattern decomposition, then keyword scoring, then the cheapest
/// affordable service.
pub fn heuristic_plan(
    query: &str,
    services: &[ServiceDescriptor],
    max_budget: u64,
    max_steps: usize,
) -> Option<TaskPlan> {
    if services.is_empty() || max_steps == 0 {
        return None;
    }
    let lowered = query.to_lowercase();

    let detected: Vec<(&Detector, Vec<String>)> = DETECTORS
        .iter()
        .map(|d| (d, d.matches(&lowered)))
        .filter(|(_, keywords)| !keywords.is_empty())
        .collect();

    let planned = if detected.is_empty() {
        keyword_plan(query, &lowered, services, max_budget, max_steps)
    } else {
        pattern_plan(query, detected, services, max_budget, max_steps)
    };

    planned.or_else(|| cheapest_plan(query, services, max_budget))
}

fn pattern_plan(
    query: &str,
    mut detected: Vec<(&Detector, Vec<String>)>,
    services: &[ServiceDescriptor],
    max_budget: u64,
    max_steps: usize,
) -> Option<TaskPlan> {
    detected.sort_by_key(|(d, _)| d.rank);

    let mut seen: Vec<ServiceCategory> = Vec::new();
    detected.retain(|(d, _)| {
        let fresh = !seen.contains(&d.category);
        seen.push(d.category);
        fresh
    });
    detected.truncate(max_steps);

    let mut draft = PlanDraft::new(query, max_budget, max_steps);
    let mut stages: Vec<&str> = Vec::new();

    for (detector, keywords) in &detected {
        let best = services
            .iter()
            .map(|s| (s, pattern_score(s, detector.category, keywords, &draft)))
            .filter(|(_, score)| *score > 0)
            .max_by(|(a, sa), (b, sb)| {
                sa.cmp(sb)
                    .then(b.price.amount.cmp(&a.price.amount))
            });

        let Some((service, score)) = best else {
            debug!("No service for {} stage", detector.category.as_str());
            continue;
        };

        let description = format!("{} with {}", detector.action, service.name);
        if draft.push(service, description, true, None) {
            debug!("Selected {} (score {})", service.id, score);
            stages.push(detector.category.as_str());
        } else {
            debug!("Skipping {} stage: {} over budget", detector.category.as_str(), service.id);
        }
    }

    let description = format!("{} pipeline for: {}", stages.join(" -> "), query);
    draft.finish(description, None, PlanStrategy::Pattern)
}

fn pattern_score(
    service: &ServiceDescriptor,
    category: ServiceCategory,
    keywords: &[String],
    draft: &PlanDraft,
) -> u32 {
    if draft.contains(&service.id) {
        return 0;
    }

    let name = service.name.to_lowercase();
    let description = service.description.to_lowercase();

    let mut score = 0;
    if service.category == category {
        score += SCORING.category_match;
    }
    for keyword in keywords {
        if name.contains(keyword.as_str()) {
            score += SCORING.pattern_name_hit;
        }
        if description.contains(keyword.as_str()) {
            score += SCORING.pattern_description_hit;
        }
        if service.tags.iter().any(|t| tag_hit(t, keyword)) {
            score += SCORING.pattern_tag_hit;
        }
    }
    score
}

/// Tags are short stems, so either side may contain the other
fn tag_hit(tag: &str, keyword: &str) -> bool {
    let tag = tag.to_lowercase();
    tag.contains(keyword) || (tag.len() >= SCORING.min_token_len && keyword.contains(&tag))
}

fn keyword_plan(
    query: &str,
    lowered: &str,
    services: &[ServiceDescriptor],
    max_budget: u64,
    max_steps: usize,
) -> Option<TaskPlan> {
    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= SCORING.min_token_len)
        .collect();

    let mut scored: Vec<(&ServiceDescriptor, u32)> = services
        .iter()
        .map(|s| (s, keyword_score(s, &tokens)))
        .collect();
    scored.sort_by(|(a, sa), (b, sb)| sb.cmp(sa).then(a.price.amount.cmp(&b.price.amount)));

    let mut draft = PlanDraft::new(query, max_budget, max_steps);
    for (service, score) in scored {
        if draft.is_full() || (score == 0 && !draft.is_empty()) {
            break;
        }
        let description = format!("Call {}: {}", service.name, service.description);
        draft.push(service, description, true, None);
    }

    let description = format!("Keyword match for: {}", query);
    draft.finish(description, None, PlanStrategy::Keyword)
}

fn keyword_score(service: &ServiceDescriptor, tokens: &[&str]) -> u32 {
    let name = service.name.to_lowercase();
    let description = service.description.to_lowercase();

    tokens
        .iter()
        .map(|token| {
            let mut score = 0;
            if name.contains(token) {
                score += SCORING.keyword_name_hit;
            }
            if description.contains(token) {
                score += SCORING.keyword_description_hit;
            }
            if service.tags.iter().any(|t| t.to_lowercase().contains(token)) {
                score += SCORING.keyword_tag_hit;
            }
            score
        })
        .sum()
}

fn cheapest_plan(
    query: &str,
    services: &[ServiceDescriptor],
    max_budget: u64,
) -> Option<TaskPlan> {
    let cheapest = services.iter().min_by_key(|s| s.price.amount)?;

    let mut draft = PlanDraft::new(query, max_budget, 1);
    let description = format!("Call {}: {}", cheapest.name, cheapest.description);
    draft.push(cheapest, description, true, None);
    draft.finish(
        format!("Cheapest service for: {}", query),
        None,
        PlanStrategy::Cheapest,
    )
}

// ============================================================================
// Plan assembly
// ============================================================================

/// Accumulates steps while enforcing the step and budget ceilings
struct PlanDraft<'q> {
    query: &'q str,
    max_budget: u64,
    max_steps: usize,
    steps: Vec<PlanStep>,
    total: u64,
}

impl<'q> PlanDraft<'q> {
    fn new(query: &'q str, max_budget: u64, max_steps: usize) -> Self {
        Self {
            query,
            max_budget,
            max_steps,
            steps: Vec::new(),
            total: 0,
        }
    }

    fn is_full(&self) -> bool {
        self.steps.len() >= self.max_steps
    }

    fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn contains(&self, service_id: &str) -> bool {
        self.steps.iter().any(|s| s.service_id == service_id)
    }

    /// Appends a step for `service` if it fits; returns whether it did
    ///
    /// Without an explicit request the step gets the default template: the
    /// query, plus the previous result for every step after the first.
    fn push(
        &mut self,
        service: &ServiceDescriptor,
        description: String,
        required: bool,
        request: Option<JsonValue>,
    ) -> bool {
        let cost = service.price.amount;
        if self.is_full() || self.total.saturating_add(cost) > self.max_budget {
            return false;
        }

        let request = request.unwrap_or_else(|| {
            if self.steps.is_empty() {
                json!({ "query": self.query })
            } else {
                json!({ "query": self.query, "input": "{{lastResult}}" })
            }
        });

        self.steps.push(PlanStep {
            id: format!("step{}", self.steps.len() + 1),
            description,
            service_id: service.id.clone(),
            request: Some(request),
            required,
            estimated_cost: cost,
            asset: service.price.asset,
        });
        self.total += cost;
        true
    }

    fn finish(
        self,
        description: String,
        output_template: Option<String>,
        strategy: PlanStrategy,
    ) -> Option<TaskPlan> {
        if self.steps.is_empty() {
            return None;
        }
        Some(TaskPlan {
            query: self.query.to_string(),
            description,
            steps: self.steps,
            estimated_total_cost: self.total,
            output_template,
            strategy,
        })
    }
}
