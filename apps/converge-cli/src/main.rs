//! # converge-cli
//!
//! Command-line interface for Converge.
//!
//! Drives the declarative policy workflow end to end:
//! - `converge validate` — check a declaration, report every issue
//! - `converge plan` — diff declared against live state
//! - `converge apply` — converge live state to the declaration
//! - `converge pipeline run` — drive a validate/apply pipeline run
//! - `converge state show/history/unlock` — inspect and recover state

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Converge CLI — declarative cloud-policy reconciliation.
#[derive(Parser)]
#[command(name = "converge", version, about)]
struct Cli {
    /// Working directory holding the .converge state layout.
    #[arg(long, default_value = ".")]
    workdir: PathBuf,

    /// Engine config file (replaces --workdir/--scope).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Default scope resource-ID (e.g., /subscriptions/<id>). Falls back
    /// to a subscription scope built from ARM_SUBSCRIPTION_ID.
    #[arg(long)]
    scope: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a declaration and report every issue found.
    Validate {
        /// Path to the declaration file.
        declaration: PathBuf,
    },
    /// Diff a declaration against live state and render the plan.
    Plan {
        /// Path to the declaration file.
        declaration: PathBuf,
        /// Also delete live resources that are no longer declared.
        #[arg(long)]
        prune: bool,
    },
    /// Plan and converge live state to the declaration.
    Apply {
        /// Path to the declaration file.
        declaration: PathBuf,
        /// Also delete live resources that are no longer declared.
        #[arg(long)]
        prune: bool,
        /// Skip the interactive confirmation.
        #[arg(long)]
        auto_approve: bool,
    },
    /// Drive pipeline runs.
    Pipeline {
        #[command(subcommand)]
        command: commands::pipeline::PipelineCommands,
    },
    /// Inspect state, history, and locks.
    State {
        #[command(subcommand)]
        command: commands::state::StateCommands,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config =
        commands::engine_config(&cli.workdir, cli.config.as_deref(), cli.scope.as_deref())?;

    match &cli.command {
        Commands::Validate { declaration } => commands::validate::execute(&config, declaration),
        Commands::Plan { declaration, prune } => {
            commands::plan::execute(&config, declaration, *prune)
        }
        Commands::Apply {
            declaration,
            prune,
            auto_approve,
        } => commands::apply::execute(&config, declaration, *prune, *auto_approve),
        Commands::Pipeline { command } => commands::pipeline::execute(command, &config),
        Commands::State { command } => commands::state::execute(command, &config),
    }
}
