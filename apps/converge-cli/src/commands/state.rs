// state.rs — State subcommands: show, history, unlock.

use clap::Subcommand;

use converge_engine::EngineConfig;
use converge_state::{HistoryLog, LocalFileBackend, StateBackend};

#[derive(Subcommand)]
pub enum StateCommands {
    /// Show the live snapshot.
    Show,
    /// Show the apply history.
    History {
        /// Also verify the hash chain.
        #[arg(long)]
        verify: bool,
    },
    /// Remove a leftover lock from a crashed run.
    Unlock {
        /// Required — removing a live run's lock corrupts state.
        #[arg(long)]
        force: bool,
    },
}

pub fn execute(cmd: &StateCommands, config: &EngineConfig) -> anyhow::Result<()> {
    match cmd {
        StateCommands::Show => {
            let backend = LocalFileBackend::new(&config.state_file)?;
            let snapshot = backend.read()?;
            println!(
                "Serial {} (lineage {}), updated {}",
                snapshot.serial, snapshot.lineage, snapshot.updated_at
            );
            for name in snapshot.resources.definitions.keys() {
                println!("  policy_definition.{}", name);
            }
            for name in snapshot.resources.assignments.keys() {
                println!("  policy_assignment.{}", name);
            }
            if snapshot.resources.is_empty() {
                println!("  (no resources)");
            }
            Ok(())
        }

        StateCommands::History { verify } => {
            if !config.history_file.exists() {
                println!("No apply history at {}", config.history_file.display());
                return Ok(());
            }

            let entries = HistoryLog::read_all(&config.history_file)?;
            for entry in &entries {
                println!(
                    "serial {:<4} plan {} at {} ({} definition(s), {} assignment(s))",
                    entry.serial, entry.plan_id, entry.applied_at, entry.definitions,
                    entry.assignments
                );
            }

            if *verify {
                HistoryLog::verify_chain(&config.history_file)?;
                println!("History verified: {} entr(ies), hash chain intact.", entries.len());
            }
            Ok(())
        }

        StateCommands::Unlock { force } => {
            if !force {
                anyhow::bail!("refusing to unlock without --force");
            }
            let mut backend = LocalFileBackend::new(&config.state_file)?;
            backend.break_lock()?;
            println!("Lock removed.");
            Ok(())
        }
    }
}
