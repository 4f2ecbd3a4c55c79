// plan.rs — The sealed execution plan.
//
// A Plan is the handoff between the plan and apply phases. It records the
// state serial it was computed against, so an apply can refuse a plan that
// has gone stale, and a content hash over the actions, so a tampered or
// corrupted plan is rejected before anything mutates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::change::ResourceChange;

/// One resource change at its logical address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedAction {
    /// The logical resource address (e.g., "policy_definition.allowed-locations").
    pub address: String,
    /// What the apply phase will do.
    pub change: ResourceChange,
}

/// Counts of each change kind, for plan rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub noop: usize,
}

/// An ordered, integrity-sealed set of resource changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub plan_id: Uuid,

    /// When the plan was computed.
    pub created_at: DateTime<Utc>,

    /// The live-state serial the plan was diffed against. An apply against
    /// any other serial is stale and must be recomputed.
    pub base_serial: u64,

    /// The actions, in apply order.
    pub actions: Vec<PlannedAction>,

    /// SHA-256 over the base serial and serialized actions.
    pub content_hash: String,
}

impl Plan {
    /// Seal a set of actions into a plan.
    pub fn new(base_serial: u64, actions: Vec<PlannedAction>) -> Self {
        let content_hash = compute_content_hash(base_serial, &actions);
        Self {
            plan_id: Uuid::new_v4(),
            created_at: Utc::now(),
            base_serial,
            actions,
            content_hash,
        }
    }

    /// True when nothing would change — the idempotence witness.
    pub fn is_empty(&self) -> bool {
        self.actions.iter().all(|a| !a.change.is_mutation())
    }

    /// Verify the content hash matches the actions.
    pub fn verify_hash(&self) -> bool {
        self.content_hash == compute_content_hash(self.base_serial, &self.actions)
    }

    /// Count actions per change kind.
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for action in &self.actions {
            match action.change {
                ResourceChange::Create { .. } => summary.create += 1,
                ResourceChange::Update { .. } => summary.update += 1,
                ResourceChange::Delete { .. } => summary.delete += 1,
                ResourceChange::NoOp => summary.noop += 1,
            }
        }
        summary
    }
}

/// SHA-256 over the base serial and serialized actions.
fn compute_content_hash(base_serial: u64, actions: &[PlannedAction]) -> String {
    let json = serde_json::to_string(actions).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(base_serial.to_be_bytes());
    hasher.update(json.as_bytes());
    format!("{:x}", hasher.finalize())
}
