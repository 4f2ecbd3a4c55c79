// apply.rs — Plan and converge live state to a declaration.

use std::io::{self, BufRead, Write};
use std::path::Path;

use converge_credentials::EnvSource;
use converge_engine::{Declaration, EngineConfig, Reconciler};
use converge_plan::DiffOptions;

use super::render_plan;

pub fn execute(
    config: &EngineConfig,
    declaration_path: &Path,
    prune: bool,
    auto_approve: bool,
) -> anyhow::Result<()> {
    let declaration = Declaration::load(declaration_path)?;
    let mut reconciler = Reconciler::init(config, &EnvSource)?;

    let plan = reconciler.plan_with_options(&declaration, DiffOptions { prune })?;
    render_plan(&plan);

    if plan.is_empty() {
        return Ok(());
    }

    if !auto_approve && !confirm()? {
        println!("Apply cancelled.");
        return Ok(());
    }

    let snapshot = reconciler.apply(&plan)?;
    println!(
        "Apply complete. State serial {} ({} definition(s), {} assignment(s)).",
        snapshot.serial,
        snapshot.resources.definitions.len(),
        snapshot.resources.assignments.len()
    );
    Ok(())
}

/// Ask for explicit confirmation. Only the exact string "yes" approves.
fn confirm() -> anyhow::Result<bool> {
    print!("Apply these changes? Only 'yes' is accepted: ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim() == "yes")
}
