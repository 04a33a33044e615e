mod cli;
mod commands;

use anyhow::Result;
use cli::{Cli, Command};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Orchestrator { config_file } => commands::run_orchestrator(config_file).await,
        Command::Agent { config_file, agent_id } => commands::run_agent(config_file, agent_id).await,
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "unrecoverable startup error");
        std::process::exit(1);
    }
    Ok(())
}
