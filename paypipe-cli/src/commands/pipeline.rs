//! Pipeline command handlers
//!
//! Starting, following, previewing and listing pipeline runs.

use anyhow::Result;
use colored::*;
use paypipe_client::PipelineClient;
use paypipe_core::domain::pipeline::{RunState, RunStatus, StepState, StepStatus};
use paypipe_core::domain::plan::TaskPlan;
use paypipe_core::dto::pipeline::{PreviewPlan, RunPipeline};
use std::time::Duration;
use uuid::Uuid;

use crate::id_resolver::resolve_run_id;
use crate::types::IdOrPrefix;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub async fn run(
    client: &PipelineClient,
    query: String,
    budget: Option<u64>,
    max_steps: Option<usize>,
    wait: bool,
) -> Result<()> {
    let accepted = client
        .run_pipeline(RunPipeline {
            query,
            budget,
            max_steps,
        })
        .await?;

    println!("{}", "✓ Pipeline started".green().bold());
    println!("  ID: {}", accepted.pipeline_id.to_string().cyan());

    if wait {
        println!();
        let status = follow(client, accepted.pipeline_id).await?;
        print_outcome(&status);
    }

    Ok(())
}

/// Polls a run until it reaches a terminal state, printing step changes
async fn follow(client: &PipelineClient, id: Uuid) -> Result<RunStatus> {
    let mut printed: Vec<StepState> = Vec::new();
    let mut planned = false;

    loop {
        let status = client.get_pipeline(id).await?;

        if !planned {
            if let Some(plan) = &status.plan {
                println!(
                    "  {} {} ({} step(s), est. {})",
                    "Plan:".bold(),
                    plan.description,
                    plan.steps.len(),
                    plan.estimated_total_cost
                );
                planned = true;
            }
        }

        printed.resize(status.steps.len(), StepState::Pending);
        for (i, step) in status.steps.iter().enumerate() {
            if step.state != printed[i] && step.state != StepState::Pending {
                print_step(i, step);
                printed[i] = step.state;
            }
        }

        if status.state.is_terminal() {
            return Ok(status);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

pub async fn status(client: &PipelineClient, id: &str) -> Result<()> {
    let id = resolve_run_id(client, &IdOrPrefix::parse(id)).await?;
    let status = client.get_pipeline(id).await?;

    println!("{}", "Pipeline Status:".bold());
    println!("  ID:      {}", status.pipeline_id.to_string().cyan());
    println!("  Query:   {}", status.query);
    println!("  State:   {}", state_label(status.state));
    println!(
        "  Started: {}",
        status.started_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(plan) = &status.plan {
        println!("  Plan:    {} ({:?})", plan.description, plan.strategy);
    }
    if !status.steps.is_empty() {
        println!("\n{}", "Steps:".bold());
        for (i, step) in status.steps.iter().enumerate() {
            print_step(i, step);
        }
    }
    println!();
    print_outcome(&status);

    Ok(())
}

pub async fn preview(
    client: &PipelineClient,
    query: String,
    budget: Option<u64>,
    max_steps: Option<usize>,
) -> Result<()> {
    let result = client
        .preview_pipeline(PreviewPlan {
            query,
            budget,
            max_steps,
        })
        .await;

    match result {
        Ok(preview) => {
            print_plan(&preview.plan);
            Ok(())
        }
        Err(e) if e.is_unplannable() => {
            println!("{}", "No plan fits this query and budget.".yellow());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn history(client: &PipelineClient, limit: usize) -> Result<()> {
    let entries = client.history(Some(limit)).await?;

    if entries.is_empty() {
        println!("{}", "No runs yet.".yellow());
        return Ok(());
    }

    println!("{}", format!("Last {} run(s):", entries.len()).bold());
    println!();
    for entry in entries {
        let mark = if entry.success {
            "✓".green()
        } else {
            "✗".red()
        };
        println!("  {} {}", mark, entry.query.bold());
        println!("    ID:       {}", entry.pipeline_id.to_string().dimmed());
        println!(
            "    Steps:    {}/{} via {}",
            entry.succeeded_steps,
            entry.step_count,
            entry.services.join(" → ")
        );
        println!(
            "    Cost:     {} in {}ms",
            entry.total_cost, entry.duration_ms
        );
        if let Some(error) = &entry.error {
            println!("    Error:    {}", error.red());
        }
        println!(
            "    Finished: {}",
            entry
                .completed_at
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .dimmed()
        );
        println!();
    }

    Ok(())
}

fn print_plan(plan: &TaskPlan) {
    println!("{}", "Plan:".bold());
    println!("  {}", plan.description);
    println!(
        "  Strategy: {:?}, estimated cost: {}",
        plan.strategy,
        plan.estimated_total_cost.to_string().cyan()
    );
    println!();
    for step in &plan.steps {
        let optional = if step.required { "" } else { " (optional)" };
        println!(
            "  {} {} {}{}",
            step.id.cyan(),
            step.service_id.bold(),
            format!("{} {}", step.estimated_cost, step.asset).dimmed(),
            optional.yellow()
        );
        println!("      {}", step.description);
    }
}

fn print_step(index: usize, step: &StepStatus) {
    let label = match step.state {
        StepState::Pending => "pending".dimmed(),
        StepState::Running => "running".yellow(),
        StepState::Succeeded => "done".green(),
        StepState::Failed => "failed".red(),
        StepState::Skipped => "skipped".dimmed(),
    };
    println!(
        "  [{}] {} {} {}",
        index + 1,
        label,
        step.service_id.bold(),
        step.description.dimmed()
    );
    if let Some(tx) = &step.tx_id {
        println!("      tx {} (cost {})", tx.dimmed(), step.cost);
    }
    if let Some(error) = &step.error {
        println!("      {}", error.red());
    }
}

fn print_outcome(status: &RunStatus) {
    match status.state {
        RunState::Complete => println!(
            "{}",
            format!(
                "✓ Complete: cost {} in {}ms",
                status.total_cost, status.duration_ms
            )
            .green()
            .bold()
        ),
        RunState::Failed => println!(
            "{}",
            format!(
                "✗ Failed: {}",
                status.error.as_deref().unwrap_or("unknown error")
            )
            .red()
            .bold()
        ),
        _ => println!("{}", "… still running".yellow()),
    }
}

fn state_label(state: RunState) -> ColoredString {
    match state {
        RunState::Created | RunState::Planning => "planning".yellow(),
        RunState::Running => "running".yellow(),
        RunState::Complete => "complete".green(),
        RunState::Failed => "failed".red(),
    }
}
