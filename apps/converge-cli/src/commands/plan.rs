// plan.rs — Diff a declaration against live state and render the result.

use std::path::Path;

use converge_credentials::EnvSource;
use converge_engine::{Declaration, EngineConfig, Reconciler};
use converge_plan::DiffOptions;

use super::render_plan;

pub fn execute(config: &EngineConfig, declaration_path: &Path, prune: bool) -> anyhow::Result<()> {
    let declaration = Declaration::load(declaration_path)?;
    let mut reconciler = Reconciler::init(config, &EnvSource)?;

    let plan = reconciler.plan_with_options(&declaration, DiffOptions { prune })?;
    render_plan(&plan);
    Ok(())
}
