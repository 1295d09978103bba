//! PayPipe CLI
//!
//! Command-line interface for the PayPipe server.

mod commands;
mod config;
mod id_resolver;
mod types;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "paypipe")]
#[command(about = "Run pay-per-call API pipelines from natural-language queries", long_about = None)]
struct Cli {
    /// Server URL
    #[arg(long, env = "PAYPIPE_SERVER_URL", default_value = "http://localhost:3001")]
    server_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        server_url: cli.server_url,
    };

    handle_command(cli.command, &config).await
}
