// reconciler.rs — The reconciliation driver.
//
// One Reconciler owns one state backend and drives the full cycle:
// validate → plan → apply. Every read-modify-write of live state happens
// under the backend's lock, and every plan/apply pair is checked for
// staleness via the state serial, so N runs of the same desired state
// converge to one live state after the first apply.
//
// Apply is fail-stop: a stale plan, a failed hash check, or a state-layer
// error aborts before the snapshot is written, leaving live state at its
// last successfully-applied value.

use std::path::PathBuf;

use tracing::info;

use converge_credentials::{CloudCredentials, SecretSource};
use converge_plan::{diff, DiffOptions, Plan, ResourceChange, ResourceSet, ResourceSpec};
use converge_policy::{EnforcementEngine, Scope};
use converge_state::{
    HistoryEntry, HistoryLog, LocalFileBackend, StateBackend, StateLock, StateSnapshot,
};

use crate::config::EngineConfig;
use crate::declaration::{Declaration, ValidationReport};
use crate::error::EngineError;

/// The reconciliation driver: validate, plan, apply.
pub struct Reconciler<B: StateBackend> {
    backend: B,
    credentials: CloudCredentials,
    history_file: PathBuf,
    default_scope: Scope,
    lock_owner: String,
}

impl Reconciler<LocalFileBackend> {
    /// Initialize the driver: load credentials, open the state backend.
    ///
    /// A missing or empty credential fails here — nothing downstream runs
    /// unauthenticated.
    pub fn init(config: &EngineConfig, secrets: &dyn SecretSource) -> Result<Self, EngineError> {
        let credentials = CloudCredentials::load(secrets)?;
        let backend = LocalFileBackend::new(&config.state_file)?;
        info!(
            subscription_id = %credentials.subscription_id,
            state_file = %config.state_file.display(),
            "reconciler initialized"
        );
        Ok(Self {
            backend,
            credentials,
            history_file: config.history_file.clone(),
            default_scope: config.default_scope.clone(),
            lock_owner: config.lock_owner.clone(),
        })
    }
}

impl<B: StateBackend> Reconciler<B> {
    /// Build a driver over any backend. The seam tests and alternative
    /// stores plug into.
    pub fn with_backend(
        backend: B,
        credentials: CloudCredentials,
        history_file: PathBuf,
        default_scope: Scope,
    ) -> Self {
        Self {
            backend,
            credentials,
            history_file,
            default_scope,
            lock_owner: "converge".to_string(),
        }
    }

    /// The credentials this driver authenticated with.
    pub fn credentials(&self) -> &CloudCredentials {
        &self.credentials
    }

    /// Check a declaration without touching state.
    ///
    /// Returns every issue found — rule parse failures verbatim, unresolved
    /// references, malformed scopes.
    pub fn validate(&self, declaration: &Declaration) -> ValidationReport {
        match declaration.resolve(&self.default_scope) {
            Ok(_) => ValidationReport::default(),
            Err(report) => report,
        }
    }

    /// Diff a declaration against live state and seal the result.
    pub fn plan(&mut self, declaration: &Declaration) -> Result<Plan, EngineError> {
        self.plan_with_options(declaration, DiffOptions::default())
    }

    /// Diff with explicit options (destructive applies set `prune`).
    pub fn plan_with_options(
        &mut self,
        declaration: &Declaration,
        options: DiffOptions,
    ) -> Result<Plan, EngineError> {
        let desired = declaration
            .resolve(&self.default_scope)
            .map_err(|report| EngineError::InvalidDeclaration { report })?;

        let lock = self.backend.lock(&self.lock_owner)?;
        let outcome = self.diff_locked(&desired, options);
        self.backend.unlock(lock)?;

        let plan = outcome?;
        let summary = plan.summary();
        info!(
            plan_id = %plan.plan_id,
            create = summary.create,
            update = summary.update,
            delete = summary.delete,
            "plan computed"
        );
        Ok(plan)
    }

    fn diff_locked(
        &mut self,
        desired: &ResourceSet,
        options: DiffOptions,
    ) -> Result<Plan, EngineError> {
        let live = self.backend.read()?;
        Ok(diff(desired, &live.resources, live.serial, options)?)
    }

    /// Execute a plan and write the successor snapshot.
    ///
    /// An empty plan is a no-op: live state and serial are untouched.
    pub fn apply(&mut self, plan: &Plan) -> Result<StateSnapshot, EngineError> {
        if !plan.verify_hash() {
            return Err(EngineError::PlanIntegrity {
                plan_id: plan.plan_id,
            });
        }

        let lock = self.backend.lock(&self.lock_owner)?;
        let outcome = self.apply_locked(&lock, plan);
        self.backend.unlock(lock)?;
        outcome
    }

    fn apply_locked(&mut self, lock: &StateLock, plan: &Plan) -> Result<StateSnapshot, EngineError> {
        let live = self.backend.read()?;
        if live.serial != plan.base_serial {
            return Err(EngineError::StalePlan {
                plan_serial: plan.base_serial,
                live_serial: live.serial,
            });
        }

        if plan.is_empty() {
            info!(serial = live.serial, "plan is empty; state already converged");
            return Ok(live);
        }

        let mut resources = live.resources.clone();
        for action in &plan.actions {
            match &action.change {
                ResourceChange::Create { after } | ResourceChange::Update { after, .. } => {
                    info!(address = %action.address, "applying {}", change_verb(&action.change));
                    insert_spec(&mut resources, after);
                }
                ResourceChange::Delete { before } => {
                    info!(address = %action.address, "applying delete");
                    remove_spec(&mut resources, before);
                }
                ResourceChange::NoOp => {}
            }
        }

        let next = live.next(resources);
        self.backend.write(lock, &next)?;

        let mut entry = HistoryEntry::for_apply(&next, plan.plan_id);
        let mut history = HistoryLog::open(&self.history_file)?;
        history.append(&mut entry)?;

        info!(serial = next.serial, "apply complete");
        Ok(next)
    }

    /// The current live snapshot (read-only, no lock).
    pub fn current_state(&self) -> Result<StateSnapshot, EngineError> {
        Ok(self.backend.read()?)
    }

    /// An enforcement engine loaded with the live snapshot's resources —
    /// what the control plane would enforce right now.
    pub fn enforcement(&self) -> Result<EnforcementEngine, EngineError> {
        let live = self.backend.read()?;
        let mut engine = EnforcementEngine::new();
        for definition in live.resources.definitions.values() {
            engine.insert_definition(definition.clone());
        }
        for assignment in live.resources.assignments.values() {
            engine.insert_assignment(assignment.clone());
        }
        Ok(engine)
    }
}

fn change_verb(change: &ResourceChange) -> &'static str {
    match change {
        ResourceChange::Create { .. } => "create",
        ResourceChange::Update { .. } => "update",
        ResourceChange::Delete { .. } => "delete",
        ResourceChange::NoOp => "noop",
    }
}

fn insert_spec(resources: &mut ResourceSet, spec: &ResourceSpec) {
    match spec {
        ResourceSpec::Definition(d) => resources.insert_definition(d.clone()),
        ResourceSpec::Assignment(a) => resources.insert_assignment(a.clone()),
    }
}

fn remove_spec(resources: &mut ResourceSet, spec: &ResourceSpec) {
    match spec {
        ResourceSpec::Definition(d) => {
            resources.definitions.remove(&d.name);
        }
        ResourceSpec::Assignment(a) => {
            resources.assignments.remove(&a.name);
        }
    }
}
