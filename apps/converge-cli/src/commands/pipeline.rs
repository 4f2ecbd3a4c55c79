// pipeline.rs — Pipeline subcommands: run.

use std::path::PathBuf;

use clap::{Subcommand, ValueEnum};

use converge_credentials::EnvSource;
use converge_engine::{Declaration, EngineConfig};
use converge_pipeline::{PipelineManifest, PipelineRun, PipelineState, StepOutcome, TriggerEvent};

/// The trigger kind delivered by the hosting platform.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EventKind {
    PullRequest,
    Push,
}

#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Execute one pipeline run for a trigger event.
    Run {
        /// Path to the declaration file.
        declaration: PathBuf,
        /// The trigger event kind.
        #[arg(long, value_enum)]
        event: EventKind,
        /// The branch the event fired on (push) or targets (pull request).
        #[arg(long, default_value = "main")]
        branch: String,
        /// The source branch of a pull request.
        #[arg(long, default_value = "")]
        source_branch: String,
        /// Optional pipeline manifest gating the run.
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
}

pub fn execute(cmd: &PipelineCommands, config: &EngineConfig) -> anyhow::Result<()> {
    match cmd {
        PipelineCommands::Run {
            declaration,
            event,
            branch,
            source_branch,
            manifest,
        } => {
            let declaration = Declaration::load(declaration)?;
            let trigger = match event {
                EventKind::PullRequest => TriggerEvent::PullRequest {
                    source_branch: source_branch.clone(),
                    target_branch: branch.clone(),
                },
                EventKind::Push => TriggerEvent::Push {
                    branch: branch.clone(),
                },
            };

            let mut run = match manifest {
                Some(path) => {
                    let manifest = PipelineManifest::load(path)?;
                    PipelineRun::from_manifest(&manifest, trigger, &EnvSource)?
                }
                None => PipelineRun::start(trigger)?,
            };

            run.execute(config, &declaration, &EnvSource)?;

            println!("Run {} ({})", run.run_id, run.trigger);
            for result in &run.steps {
                match &result.outcome {
                    StepOutcome::Succeeded { detail } => match detail {
                        Some(detail) => println!("  ok   {:<9} {}", result.step.to_string(), detail),
                        None => println!("  ok   {}", result.step),
                    },
                    StepOutcome::Failed { reason } => {
                        println!("  FAIL {:<9} {}", result.step.to_string(), reason)
                    }
                }
            }
            println!("Result: {}", run.state);

            // A halted run is a failed job for the hosting platform.
            match &run.state {
                PipelineState::Validated | PipelineState::Applied => Ok(()),
                PipelineState::Rejected { step, .. } | PipelineState::Failed { step, .. } => {
                    anyhow::bail!("pipeline halted at the {} step", step)
                }
                other => anyhow::bail!("pipeline ended in unexpected state '{}'", other),
            }
        }
    }
}
