// assignment.rs — Policy assignments: a definition bound to a scope.
//
// An assignment is what activates enforcement. It references a definition
// by name and names the scope that bounds the blast radius. The reference
// must resolve to an existing definition before the assignment can exist —
// that ordering is enforced by the planning layer, not here.

use serde::{Deserialize, Serialize};

use crate::scope::Scope;

/// A policy assignment — binds a [`crate::PolicyDefinition`] to a scope.
///
/// Enforcement is effective immediately upon a successful apply; there is
/// no staged rollout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyAssignment {
    /// Unique name within the assignment scope.
    pub name: String,

    /// Human-readable name shown in compliance views.
    pub display_name: String,

    /// Name of the definition this assignment activates.
    pub definition_ref: String,

    /// Where enforcement applies.
    pub scope: Scope,
}

impl PolicyAssignment {
    /// The deterministic resource identifier for this assignment.
    pub fn assignment_id(&self) -> String {
        format!(
            "{}/providers/Microsoft.Authorization/policyAssignments/{}",
            self.scope, self.name
        )
    }
}
