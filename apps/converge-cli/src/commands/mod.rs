// mod.rs — Command modules and shared helpers.

pub mod apply;
pub mod pipeline;
pub mod plan;
pub mod state;
pub mod validate;

use std::path::Path;

use converge_credentials::SUBSCRIPTION_ID_VAR;
use converge_engine::EngineConfig;
use converge_plan::{Plan, ResourceChange};
use converge_policy::Scope;

/// Resolve the engine config: an explicit config file wins, then
/// --workdir/--scope, then a subscription scope from the environment.
pub fn engine_config(
    workdir: &Path,
    config: Option<&Path>,
    scope: Option<&str>,
) -> anyhow::Result<EngineConfig> {
    if let Some(path) = config {
        return Ok(EngineConfig::load(path)?);
    }
    let scope = match scope {
        Some(raw) => raw.parse::<Scope>()?,
        None => match std::env::var(SUBSCRIPTION_ID_VAR) {
            Ok(id) if !id.is_empty() => Scope::Subscription(id),
            _ => anyhow::bail!(
                "no scope: pass --config or --scope, or set {}",
                SUBSCRIPTION_ID_VAR
            ),
        },
    };
    Ok(EngineConfig::for_workdir(workdir, scope))
}

/// Render a plan the way reviewers read it: one line per change, then the
/// summary.
pub fn render_plan(plan: &Plan) {
    for action in &plan.actions {
        let marker = match &action.change {
            ResourceChange::Create { .. } => "+",
            ResourceChange::Update { .. } => "~",
            ResourceChange::Delete { .. } => "-",
            ResourceChange::NoOp => continue,
        };
        println!("  {} {}", marker, action.address);
    }
    let summary = plan.summary();
    if plan.is_empty() {
        println!("No changes. Live state matches the declaration.");
    } else {
        println!(
            "Plan: {} to create, {} to update, {} to delete.",
            summary.create, summary.update, summary.delete
        );
    }
}
