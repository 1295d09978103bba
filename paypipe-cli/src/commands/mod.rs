//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod catalog;
mod pipeline;
mod spend;

use anyhow::Result;
use clap::Subcommand;
use paypipe_client::PipelineClient;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Plan and run a pipeline for a query
    Run {
        /// Natural-language query
        query: String,

        /// Plan budget in micro-units (server default when omitted)
        #[arg(short, long)]
        budget: Option<u64>,

        /// Maximum number of steps
        #[arg(long)]
        max_steps: Option<usize>,

        /// Follow the run until it finishes
        #[arg(short, long)]
        wait: bool,
    },
    /// Show the status of a run
    Status {
        /// Run ID or unambiguous prefix
        id: String,
    },
    /// Show the plan for a query without running it
    Preview {
        query: String,

        #[arg(short, long)]
        budget: Option<u64>,

        #[arg(long)]
        max_steps: Option<usize>,
    },
    /// List recent runs
    History {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// List catalog services
    Services {
        /// Only services matching these keywords
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show spend totals and limits
    Spend,
    /// Change spend limits
    Limits {
        /// Ceiling for a single run, in micro-units
        #[arg(long)]
        max_per_task: Option<u64>,

        /// Ceiling for one day, in micro-units
        #[arg(long)]
        max_per_day: Option<u64>,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let client = PipelineClient::new(&config.server_url);

    match command {
        Commands::Run {
            query,
            budget,
            max_steps,
            wait,
        } => pipeline::run(&client, query, budget, max_steps, wait).await,
        Commands::Status { id } => pipeline::status(&client, &id).await,
        Commands::Preview {
            query,
            budget,
            max_steps,
        } => pipeline::preview(&client, query, budget, max_steps).await,
        Commands::History { limit } => pipeline::history(&client, limit).await,
        Commands::Services { search } => catalog::services(&client, search.as_deref()).await,
        Commands::Spend => spend::summary(&client).await,
        Commands::Limits {
            max_per_task,
            max_per_day,
        } => spend::limits(&client, max_per_task, max_per_day).await,
    }
}
