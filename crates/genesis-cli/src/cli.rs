use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "genesis", about = "Genesis Core infrastructure control plane", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the orchestrator: one reconcile worker per resource kind family,
    /// the IAM kernel, the event dispatcher, and the illustrative HTTP
    /// surface.
    Orchestrator {
        #[arg(long)]
        config_file: PathBuf,
    },

    /// Run one universal agent poll loop against the same store backend.
    Agent {
        #[arg(long)]
        config_file: PathBuf,

        /// Identifier this agent advertises to the scheduler.
        #[arg(long, default_value = "agent-local")]
        agent_id: String,
    },
}
