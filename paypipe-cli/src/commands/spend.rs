//! Spend command handlers

use anyhow::{Result, bail};
use colored::*;
use paypipe_client::PipelineClient;
use paypipe_core::dto::spend::UpdateLimits;

pub async fn summary(client: &PipelineClient) -> Result<()> {
    let summary = client.spend_summary().await?;

    println!("{}", "Spend:".bold());
    println!(
        "  Today:     {} across {} payment(s)",
        summary.today.total.to_string().cyan(),
        summary.today.count
    );
    println!(
        "  All time:  {} across {} payment(s)",
        summary.all_time.total, summary.all_time.count
    );
    println!("  Remaining: {}", summary.remaining_today.to_string().green());
    if summary.reserved > 0 {
        println!("  Reserved:  {}", summary.reserved.to_string().yellow());
    }
    println!(
        "  Limits:    {} per task, {} per day",
        summary.limits.max_per_task, summary.limits.max_per_day
    );

    if !summary.by_service.is_empty() {
        println!("\n{}", "Today by service:".bold());
        for service in &summary.by_service {
            println!(
                "  {:<24} {:>10} ({} call(s))",
                service.service_name, service.total, service.count
            );
        }
    }

    if !summary.recent.is_empty() {
        println!("\n{}", "Recent payments:".bold());
        for record in &summary.recent {
            println!(
                "  {} {:>8} {:<6} {} {}",
                record.timestamp.format("%H:%M:%S").to_string().dimmed(),
                record.amount,
                record.asset.to_string(),
                record.service_name,
                record.tx_id.as_deref().unwrap_or("").dimmed()
            );
        }
    }

    Ok(())
}

pub async fn limits(
    client: &PipelineClient,
    max_per_task: Option<u64>,
    max_per_day: Option<u64>,
) -> Result<()> {
    if max_per_task.is_none() && max_per_day.is_none() {
        bail!("Pass --max-per-task and/or --max-per-day");
    }

    let limits = client
        .update_limits(UpdateLimits {
            max_per_task,
            max_per_day,
        })
        .await?;

    println!("{}", "✓ Spend limits updated".green().bold());
    println!("  Per task: {}", limits.max_per_task.to_string().cyan());
    println!("  Per day:  {}", limits.max_per_day.to_string().cyan());

    Ok(())
}
