// reconcile_flow.rs — End-to-end reconciliation scenarios.
//
// Exercises the full cycle against a real file-backed state store:
// validate → plan → apply → re-plan, enforcement after convergence,
// lock contention between two drivers, and stale-plan rejection.

use tempfile::TempDir;

use converge_credentials::StaticSource;
use converge_engine::{Declaration, EngineConfig, EngineError, Reconciler};
use converge_plan::DiffOptions;
use converge_policy::{EnforcementDecision, ResourceRequest, Scope};
use converge_state::{HistoryLog, LocalFileBackend, StateBackend, StateError};

const DECLARATION: &str = r#"
    [definition.allowed-locations]
    display_name = "Allowed locations"
    description = "Resources may only be created in eastus"
    rule = '''
    { "if": { "field": "location", "notEquals": "eastus" },
      "then": { "effect": "deny" } }
    '''

    [assignment.restrict-locations]
    display_name = "Restrict locations"
    definition = "allowed-locations"
"#;

fn setup(dir: &TempDir) -> (EngineConfig, Declaration) {
    let config = EngineConfig::for_workdir(dir.path(), Scope::Subscription("sub-1".to_string()));
    let declaration = Declaration::from_toml(DECLARATION).unwrap();
    (config, declaration)
}

fn init(config: &EngineConfig) -> Reconciler<LocalFileBackend> {
    Reconciler::init(config, &StaticSource::complete()).unwrap()
}

#[test]
fn apply_then_replan_is_empty() {
    let dir = TempDir::new().unwrap();
    let (config, declaration) = setup(&dir);
    let mut reconciler = init(&config);

    assert!(reconciler.validate(&declaration).ok());

    let plan = reconciler.plan(&declaration).unwrap();
    assert_eq!(plan.summary().create, 2);

    let snapshot = reconciler.apply(&plan).unwrap();
    assert_eq!(snapshot.serial, 1);
    assert_eq!(snapshot.resources.definitions.len(), 1);
    assert_eq!(snapshot.resources.assignments.len(), 1);

    // Idempotence: nothing drifted, so the second plan is all no-ops and
    // applying it does not advance the serial.
    let second = reconciler.plan(&declaration).unwrap();
    assert!(second.is_empty());
    let after = reconciler.apply(&second).unwrap();
    assert_eq!(after.serial, 1);
}

#[test]
fn definition_is_created_before_assignment() {
    let dir = TempDir::new().unwrap();
    let (config, declaration) = setup(&dir);
    let mut reconciler = init(&config);

    let plan = reconciler.plan(&declaration).unwrap();
    let mutations: Vec<&str> = plan
        .actions
        .iter()
        .filter(|a| a.change.is_mutation())
        .map(|a| a.address.as_str())
        .collect();
    assert_eq!(
        mutations,
        vec![
            "policy_definition.allowed-locations",
            "policy_assignment.restrict-locations"
        ]
    );
}

#[test]
fn enforcement_after_convergence() {
    let dir = TempDir::new().unwrap();
    let (config, declaration) = setup(&dir);
    let mut reconciler = init(&config);

    let plan = reconciler.plan(&declaration).unwrap();
    reconciler.apply(&plan).unwrap();

    let engine = reconciler.enforcement().unwrap();
    let rg = |location: &str| {
        ResourceRequest::new(
            "resourceGroup",
            Scope::ResourceGroup {
                subscription_id: "sub-1".to_string(),
                name: "rg-app".to_string(),
            },
        )
        .with_property("location", location)
    };

    match engine.evaluate(&rg("westus")) {
        EnforcementDecision::Denied { assignment, .. } => {
            assert_eq!(assignment, "restrict-locations");
        }
        other => panic!("expected Denied, got {:?}", other),
    }
    assert_eq!(engine.evaluate(&rg("eastus")), EnforcementDecision::Allowed);
}

#[test]
fn missing_credential_fails_at_init() {
    let dir = TempDir::new().unwrap();
    let (config, _) = setup(&dir);

    let incomplete = StaticSource::new()
        .with("ARM_CLIENT_ID", "id")
        .with("ARM_CLIENT_SECRET", "secret")
        .with("ARM_SUBSCRIPTION_ID", "sub");
    match Reconciler::init(&config, &incomplete) {
        Err(EngineError::Credential(_)) => {}
        other => panic!("expected Credential error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn concurrent_run_fails_fast_on_lock() {
    let dir = TempDir::new().unwrap();
    let (config, declaration) = setup(&dir);
    let mut reconciler = init(&config);

    // Another run holds the lock on the same state.
    let mut other = LocalFileBackend::new(&config.state_file).unwrap();
    let held = other.lock("other-run").unwrap();

    match reconciler.plan(&declaration) {
        Err(EngineError::State(StateError::LockHeld { holder, .. })) => {
            assert_eq!(holder, "other-run");
        }
        other => panic!("expected LockHeld, got {:?}", other.map(|_| ())),
    }

    // The losing run mutated nothing.
    assert_eq!(reconciler.current_state().unwrap().serial, 0);

    // Once the holder releases, the run goes through.
    other.unlock(held).unwrap();
    assert!(reconciler.plan(&declaration).is_ok());
}

#[test]
fn stale_plan_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (config, declaration) = setup(&dir);
    let mut reconciler = init(&config);

    let plan = reconciler.plan(&declaration).unwrap();
    reconciler.apply(&plan).unwrap();

    // The same plan again: live state has moved to serial 1.
    match reconciler.apply(&plan) {
        Err(EngineError::StalePlan {
            plan_serial,
            live_serial,
        }) => {
            assert_eq!(plan_serial, 0);
            assert_eq!(live_serial, 1);
        }
        other => panic!("expected StalePlan, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn tampered_plan_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (config, declaration) = setup(&dir);
    let mut reconciler = init(&config);

    let mut plan = reconciler.plan(&declaration).unwrap();
    plan.actions.pop();
    match reconciler.apply(&plan) {
        Err(EngineError::PlanIntegrity { .. }) => {}
        other => panic!("expected PlanIntegrity, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn apply_appends_verifiable_history() {
    let dir = TempDir::new().unwrap();
    let (config, declaration) = setup(&dir);
    let mut reconciler = init(&config);

    let plan = reconciler.plan(&declaration).unwrap();
    reconciler.apply(&plan).unwrap();

    // Revise the rule and apply again.
    let revised = Declaration::from_toml(&DECLARATION.replace("eastus", "westeurope")).unwrap();
    let plan2 = reconciler.plan(&revised).unwrap();
    assert_eq!(plan2.summary().update, 1);
    let snapshot = reconciler.apply(&plan2).unwrap();
    assert_eq!(snapshot.serial, 2);

    let entries = HistoryLog::read_all(&config.history_file).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].serial, 1);
    assert_eq!(entries[1].serial, 2);
    HistoryLog::verify_chain(&config.history_file).unwrap();
}

#[test]
fn prune_removes_undeclared_resources() {
    let dir = TempDir::new().unwrap();
    let (config, declaration) = setup(&dir);
    let mut reconciler = init(&config);

    let plan = reconciler.plan(&declaration).unwrap();
    reconciler.apply(&plan).unwrap();

    // An empty declaration with prune tears everything down.
    let empty = Declaration::from_toml("").unwrap();
    let teardown = reconciler
        .plan_with_options(&empty, DiffOptions { prune: true })
        .unwrap();
    assert_eq!(teardown.summary().delete, 2);

    let snapshot = reconciler.apply(&teardown).unwrap();
    assert_eq!(snapshot.serial, 2);
    assert!(snapshot.resources.is_empty());
}
