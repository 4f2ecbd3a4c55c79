// diff.rs — Compute the minimal change set between declared and live state.
//
// The diff is a set comparison on logical names plus a field-level compare
// for resources present on both sides. Reference resolution happens here:
// an assignment whose definition_ref resolves nowhere fails the diff before
// a plan exists, so the failure is deterministic and nothing mutates.
//
// Apply order is baked into the action order:
//   1. definition creates/updates      (references must exist first)
//   2. assignment creates/updates
//   3. assignment deletes              (destructive applies only)
//   4. definition deletes
// Reverse order on the way down mirrors the way up.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use converge_policy::{PolicyAssignment, PolicyDefinition};

use crate::change::{ResourceChange, ResourceSpec};
use crate::error::PlanError;
use crate::plan::{Plan, PlannedAction};

/// A set of policy resources keyed by logical name.
///
/// `BTreeMap` keeps iteration (and therefore action and serialization
/// order) stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSet {
    pub definitions: BTreeMap<String, PolicyDefinition>,
    pub assignments: BTreeMap<String, PolicyAssignment>,
}

impl ResourceSet {
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty() && self.assignments.is_empty()
    }

    pub fn insert_definition(&mut self, definition: PolicyDefinition) {
        self.definitions.insert(definition.name.clone(), definition);
    }

    pub fn insert_assignment(&mut self, assignment: PolicyAssignment) {
        self.assignments.insert(assignment.name.clone(), assignment);
    }
}

/// Knobs for the diff.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffOptions {
    /// Delete live resources that are no longer declared. Off by default:
    /// the default flow only creates and revises.
    pub prune: bool,
}

/// Diff declared against live resources and seal the result into a [`Plan`].
///
/// `base_serial` is the live-state serial the comparison was made against;
/// it travels with the plan so a later apply can detect staleness.
pub fn diff(
    desired: &ResourceSet,
    live: &ResourceSet,
    base_serial: u64,
    options: DiffOptions,
) -> Result<Plan, PlanError> {
    // Reference resolution first: every declared assignment must point at a
    // definition that will exist once the plan is applied.
    for assignment in desired.assignments.values() {
        let in_desired = desired.definitions.contains_key(&assignment.definition_ref);
        let survives_in_live = !options.prune
            && live.definitions.contains_key(&assignment.definition_ref);
        if !in_desired && !survives_in_live {
            return Err(PlanError::DanglingReference {
                assignment: assignment.name.clone(),
                definition: assignment.definition_ref.clone(),
            });
        }
    }

    let mut actions = Vec::new();

    // Phase 1: definitions up.
    for (name, desired_def) in &desired.definitions {
        let spec = ResourceSpec::Definition(desired_def.clone());
        let address = spec.address();
        let change = match live.definitions.get(name) {
            None => ResourceChange::Create { after: spec },
            Some(live_def) if live_def != desired_def => ResourceChange::Update {
                before: ResourceSpec::Definition(live_def.clone()),
                after: spec,
            },
            Some(_) => ResourceChange::NoOp,
        };
        actions.push(PlannedAction { address, change });
    }

    // Phase 2: assignments up.
    for (name, desired_assignment) in &desired.assignments {
        let spec = ResourceSpec::Assignment(desired_assignment.clone());
        let address = spec.address();
        let change = match live.assignments.get(name) {
            None => ResourceChange::Create { after: spec },
            Some(live_assignment) if live_assignment != desired_assignment => {
                ResourceChange::Update {
                    before: ResourceSpec::Assignment(live_assignment.clone()),
                    after: spec,
                }
            }
            Some(_) => ResourceChange::NoOp,
        };
        actions.push(PlannedAction { address, change });
    }

    // Phase 3 and 4: the way down — assignments before the definitions
    // they reference.
    for (name, live_assignment) in &live.assignments {
        if desired.assignments.contains_key(name) {
            continue;
        }
        if options.prune {
            let before = ResourceSpec::Assignment(live_assignment.clone());
            actions.push(PlannedAction {
                address: before.address(),
                change: ResourceChange::Delete { before },
            });
        } else {
            warn!(assignment = %name, "live assignment is not declared; leaving in place (prune disabled)");
        }
    }
    for (name, live_def) in &live.definitions {
        if desired.definitions.contains_key(name) {
            continue;
        }
        if options.prune {
            let before = ResourceSpec::Definition(live_def.clone());
            actions.push(PlannedAction {
                address: before.address(),
                change: ResourceChange::Delete { before },
            });
        } else {
            warn!(definition = %name, "live definition is not declared; leaving in place (prune disabled)");
        }
    }

    let plan = Plan::new(base_serial, actions);
    debug!(
        plan_id = %plan.plan_id,
        base_serial,
        actions = plan.actions.len(),
        "diff complete"
    );
    Ok(plan)
}
