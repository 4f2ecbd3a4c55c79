// validate.rs — Check a declaration and report every issue.

use std::path::Path;

use converge_credentials::EnvSource;
use converge_engine::{Declaration, EngineConfig, Reconciler};

pub fn execute(config: &EngineConfig, declaration_path: &Path) -> anyhow::Result<()> {
    let declaration = Declaration::load(declaration_path)?;
    let reconciler = Reconciler::init(config, &EnvSource)?;

    let report = reconciler.validate(&declaration);
    if report.ok() {
        println!("Declaration is valid.");
        return Ok(());
    }

    println!("Declaration has {} issue(s):", report.issues.len());
    for issue in &report.issues {
        println!("  [{}] {}", issue.address, issue.message);
    }
    anyhow::bail!("validation failed");
}
