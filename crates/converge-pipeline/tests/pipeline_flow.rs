// pipeline_flow.rs — End-to-end pipeline scenarios.
//
// Drives PipelineRun::execute against a real engine config and state
// store: validate path leaves state untouched, apply path converges it,
// and a broken declaration halts the validate path before apply exists.

use tempfile::TempDir;

use converge_credentials::{StaticSource, REQUIRED_VARS};
use converge_engine::{Declaration, EngineConfig};
use converge_pipeline::{
    PipelineManifest, PipelineRun, PipelineState, StepKind, StepOutcome, TriggerEvent,
};
use converge_policy::Scope;

const DECLARATION: &str = r#"
    [definition.allowed-locations]
    display_name = "Allowed locations"
    rule = '''
    { "if": { "field": "location", "notEquals": "eastus" },
      "then": { "effect": "deny" } }
    '''

    [assignment.restrict-locations]
    display_name = "Restrict locations"
    definition = "allowed-locations"
"#;

const BROKEN_DECLARATION: &str = r#"
    [definition.allowed-locations]
    display_name = "Allowed locations"
    rule = "{ if: unquoted"
"#;

fn config(dir: &TempDir) -> EngineConfig {
    EngineConfig::for_workdir(dir.path(), Scope::Subscription("sub-1".to_string()))
}

fn pr_to_main() -> TriggerEvent {
    TriggerEvent::PullRequest {
        source_branch: "feature/rule-change".to_string(),
        target_branch: "main".to_string(),
    }
}

fn push_to_main() -> TriggerEvent {
    TriggerEvent::Push {
        branch: "main".to_string(),
    }
}

#[test]
fn validate_path_does_not_touch_state() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let declaration = Declaration::from_toml(DECLARATION).unwrap();

    let mut run = PipelineRun::start(pr_to_main()).unwrap();
    let state = run
        .execute(&config, &declaration, &StaticSource::complete())
        .unwrap();

    assert_eq!(*state, PipelineState::Validated);
    assert_eq!(run.steps.len(), 3); // init, validate, plan — no apply
    assert!(run.steps.iter().all(|s| s.step != StepKind::Apply));

    // Live state was never written.
    assert!(!config.state_file.exists());
}

#[test]
fn apply_path_converges_state() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let declaration = Declaration::from_toml(DECLARATION).unwrap();

    let mut run = PipelineRun::start(push_to_main()).unwrap();
    let state = run
        .execute(&config, &declaration, &StaticSource::complete())
        .unwrap();

    assert_eq!(*state, PipelineState::Applied);
    assert_eq!(run.steps.len(), 4);
    match &run.steps[3].outcome {
        StepOutcome::Succeeded { detail } => {
            assert_eq!(detail.as_deref(), Some("state serial 1"));
        }
        other => panic!("expected Succeeded, got {:?}", other),
    }
    assert!(config.state_file.exists());
}

#[test]
fn broken_declaration_is_rejected_at_validate() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let declaration = Declaration::from_toml(BROKEN_DECLARATION).unwrap();

    let mut run = PipelineRun::start(pr_to_main()).unwrap();
    let state = run
        .execute(&config, &declaration, &StaticSource::complete())
        .unwrap();

    match state {
        PipelineState::Rejected { step, reason } => {
            assert_eq!(*step, StepKind::Validate);
            assert!(reason.contains("invalid policy rule document"));
        }
        other => panic!("expected Rejected, got {:?}", other),
    }

    // The run halted at validate: plan and apply never ran, state untouched.
    assert_eq!(run.steps.len(), 2); // init succeeded, validate halted the run
    assert!(matches!(
        run.steps[1].outcome,
        StepOutcome::Failed { .. }
    ));
    assert!(!config.state_file.exists());
}

#[test]
fn missing_credentials_halt_at_init() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let declaration = Declaration::from_toml(DECLARATION).unwrap();

    let mut run = PipelineRun::start(push_to_main()).unwrap();
    let state = run
        .execute(&config, &declaration, &StaticSource::new())
        .unwrap();

    match state {
        PipelineState::Failed { step, reason } => {
            assert_eq!(*step, StepKind::Init);
            assert!(reason.contains("ARM_CLIENT_ID"));
        }
        other => panic!("expected Failed, got {:?}", other),
    }
    assert!(!config.state_file.exists());
}

#[test]
fn finished_run_cannot_execute_again() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let declaration = Declaration::from_toml(DECLARATION).unwrap();

    let mut run = PipelineRun::start(pr_to_main()).unwrap();
    run.execute(&config, &declaration, &StaticSource::complete())
        .unwrap();
    assert!(run
        .execute(&config, &declaration, &StaticSource::complete())
        .is_err());
}

#[test]
fn manifest_gates_the_whole_flow() {
    let manifest = PipelineManifest::from_yaml(&format!(
        r#"
name: policy-delivery
on:
  pull_request:
    branches: [main]
  push:
    branches: [main]
required_secrets: [{}]
"#,
        REQUIRED_VARS.join(", ")
    ))
    .unwrap();

    // Matching trigger with complete secrets: run starts.
    assert!(
        PipelineRun::from_manifest(&manifest, pr_to_main(), &StaticSource::complete()).is_ok()
    );

    // Missing secret: no run.
    assert!(
        PipelineRun::from_manifest(&manifest, pr_to_main(), &StaticSource::new()).is_err()
    );

    // Unfiltered branch: no run.
    let off_branch = TriggerEvent::Push {
        branch: "develop".to_string(),
    };
    assert!(
        PipelineRun::from_manifest(&manifest, off_branch, &StaticSource::complete()).is_err()
    );
}
