// run.rs — PipelineRun: the two-phase delivery state machine.
//
// The lifecycle is a small directed graph with two disjoint paths:
//
//   Idle → Validating → Validated | Rejected     (pull-request events)
//   Idle → Applying   → Applied   | Failed       (push-to-main events)
//
// There is deliberately no edge from Validated to Applying: a validated
// change only reaches the apply path through a merge, which arrives as a
// fresh push event and a fresh run.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use converge_credentials::SecretSource;
use converge_engine::{Declaration, EngineConfig, Reconciler};

use crate::error::PipelineError;
use crate::manifest::PipelineManifest;

/// The branch whose pushes enter the apply path and whose pull requests
/// enter the validate path.
pub const DEFAULT_BRANCH: &str = "main";

/// What woke the pipeline up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TriggerEvent {
    /// A pull request opened or updated against a target branch.
    PullRequest {
        source_branch: String,
        target_branch: String,
    },
    /// A push (including a merge) to a branch.
    Push { branch: String },
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerEvent::PullRequest {
                source_branch,
                target_branch,
            } => write!(f, "pull_request({} -> {})", source_branch, target_branch),
            TriggerEvent::Push { branch } => write!(f, "push({})", branch),
        }
    }
}

/// One step in the pipeline sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Init,
    Validate,
    Plan,
    Apply,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Init => write!(f, "init"),
            StepKind::Validate => write!(f, "validate"),
            StepKind::Plan => write!(f, "plan"),
            StepKind::Apply => write!(f, "apply"),
        }
    }
}

/// How one step ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// The reason is the underlying error, verbatim.
    Failed { reason: String },
}

/// One executed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub step: StepKind,
    pub outcome: StepOutcome,
}

/// The lifecycle state of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    /// Created, no path entered yet.
    Idle,
    /// Running the validate path.
    Validating,
    /// Validate path finished clean — the change may merge.
    Validated,
    /// Validate path halted at a step — the change must not merge.
    Rejected { step: StepKind, reason: String },
    /// Running the apply path.
    Applying,
    /// Apply path finished; live state converged.
    Applied,
    /// Apply path halted at a step; live state is whatever the last
    /// successful apply left.
    Failed { step: StepKind, reason: String },
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::Validating => write!(f, "validating"),
            PipelineState::Validated => write!(f, "validated"),
            PipelineState::Rejected { .. } => write!(f, "rejected"),
            PipelineState::Applying => write!(f, "applying"),
            PipelineState::Applied => write!(f, "applied"),
            PipelineState::Failed { .. } => write!(f, "failed"),
        }
    }
}

impl PipelineState {
    /// Check whether transitioning from this state to `next` is valid.
    ///
    /// Note the absent edges: nothing leads from `Validated` to
    /// `Applying`, and terminal states lead nowhere.
    pub fn can_transition_to(&self, next: &PipelineState) -> bool {
        matches!(
            (self, next),
            (PipelineState::Idle, PipelineState::Validating)
                | (PipelineState::Idle, PipelineState::Applying)
                | (PipelineState::Validating, PipelineState::Validated)
                | (PipelineState::Validating, PipelineState::Rejected { .. })
                | (PipelineState::Applying, PipelineState::Applied)
                | (PipelineState::Applying, PipelineState::Failed { .. })
        )
    }

    /// Whether the run has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Validated
                | PipelineState::Rejected { .. }
                | PipelineState::Applied
                | PipelineState::Failed { .. }
        )
    }
}

/// One pipeline run — a trigger, a path, and its step results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub trigger: TriggerEvent,
    pub state: PipelineState,
    pub steps: Vec<StepResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    /// Enter the path the trigger is guarded into.
    ///
    /// Pull requests targeting the default branch enter `Validating`;
    /// pushes to the default branch enter `Applying`; everything else is
    /// rejected before a run exists.
    pub fn start(trigger: TriggerEvent) -> Result<Self, PipelineError> {
        let entered = match &trigger {
            TriggerEvent::PullRequest { target_branch, .. } if target_branch == DEFAULT_BRANCH => {
                PipelineState::Validating
            }
            TriggerEvent::PullRequest { target_branch, .. } => {
                return Err(PipelineError::InvalidTrigger {
                    trigger: trigger.to_string(),
                    reason: format!(
                        "pull requests only validate against '{}', not '{}'",
                        DEFAULT_BRANCH, target_branch
                    ),
                });
            }
            TriggerEvent::Push { branch } if branch == DEFAULT_BRANCH => PipelineState::Applying,
            TriggerEvent::Push { branch } => {
                return Err(PipelineError::InvalidTrigger {
                    trigger: trigger.to_string(),
                    reason: format!("only pushes to '{}' apply, not '{}'", DEFAULT_BRANCH, branch),
                });
            }
        };

        let mut run = Self {
            run_id: Uuid::new_v4(),
            trigger,
            state: PipelineState::Idle,
            steps: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        };
        run.transition(entered)?;
        info!(run_id = %run.run_id, trigger = %run.trigger, state = %run.state, "pipeline run started");
        Ok(run)
    }

    /// Gate through a manifest first (branch filters, required secrets),
    /// then enter the path.
    pub fn from_manifest(
        manifest: &PipelineManifest,
        trigger: TriggerEvent,
        secrets: &dyn SecretSource,
    ) -> Result<Self, PipelineError> {
        manifest.authorize(&trigger, secrets)?;
        Self::start(trigger)
    }

    /// Run the step sequence for the entered path.
    ///
    /// `init → validate → plan` on the validate path, plus `apply` on the
    /// apply path. The first failing step halts the run (fail-stop): no
    /// retry, no rollback, the failing step and its reason recorded
    /// verbatim in the terminal state.
    pub fn execute(
        &mut self,
        config: &EngineConfig,
        declaration: &Declaration,
        secrets: &dyn SecretSource,
    ) -> Result<&PipelineState, PipelineError> {
        let apply_path = match self.state {
            PipelineState::Validating => false,
            PipelineState::Applying => true,
            ref other => {
                return Err(PipelineError::InvalidTransition {
                    from: other.to_string(),
                    to: "running".to_string(),
                });
            }
        };

        let outcome = self.run_steps(config, declaration, secrets, apply_path);
        let terminal = match (outcome, apply_path) {
            (Ok(()), false) => PipelineState::Validated,
            (Ok(()), true) => PipelineState::Applied,
            (Err((step, reason)), false) => PipelineState::Rejected { step, reason },
            (Err((step, reason)), true) => PipelineState::Failed { step, reason },
        };
        self.transition(terminal)?;
        self.finished_at = Some(Utc::now());
        info!(run_id = %self.run_id, state = %self.state, "pipeline run finished");
        Ok(&self.state)
    }

    fn run_steps(
        &mut self,
        config: &EngineConfig,
        declaration: &Declaration,
        secrets: &dyn SecretSource,
        apply_path: bool,
    ) -> Result<(), (StepKind, String)> {
        let mut reconciler = match Reconciler::init(config, secrets) {
            Ok(r) => {
                self.record(StepKind::Init, StepOutcome::Succeeded { detail: None });
                r
            }
            Err(e) => return self.halt(StepKind::Init, e.to_string()),
        };

        let report = reconciler.validate(declaration);
        if report.ok() {
            self.record(StepKind::Validate, StepOutcome::Succeeded { detail: None });
        } else {
            return self.halt(StepKind::Validate, report.to_string());
        }

        let plan = match reconciler.plan(declaration) {
            Ok(plan) => {
                let summary = plan.summary();
                self.record(
                    StepKind::Plan,
                    StepOutcome::Succeeded {
                        detail: Some(format!(
                            "{} to create, {} to update, {} to delete",
                            summary.create, summary.update, summary.delete
                        )),
                    },
                );
                plan
            }
            Err(e) => return self.halt(StepKind::Plan, e.to_string()),
        };

        if apply_path {
            match reconciler.apply(&plan) {
                Ok(snapshot) => {
                    self.record(
                        StepKind::Apply,
                        StepOutcome::Succeeded {
                            detail: Some(format!("state serial {}", snapshot.serial)),
                        },
                    );
                }
                Err(e) => return self.halt(StepKind::Apply, e.to_string()),
            }
        }

        Ok(())
    }

    fn record(&mut self, step: StepKind, outcome: StepOutcome) {
        self.steps.push(StepResult { step, outcome });
    }

    fn halt(&mut self, step: StepKind, reason: String) -> Result<(), (StepKind, String)> {
        warn!(run_id = %self.run_id, step = %step, reason = %reason, "pipeline step failed");
        self.record(
            step,
            StepOutcome::Failed {
                reason: reason.clone(),
            },
        );
        Err((step, reason))
    }

    /// Transition to a new state. Returns an error if the edge does not
    /// exist in the lifecycle graph.
    fn transition(&mut self, next: PipelineState) -> Result<(), PipelineError> {
        if !self.state.can_transition_to(&next) {
            return Err(PipelineError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }
}
