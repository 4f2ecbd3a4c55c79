// definition.rs — Policy definitions: named, registered rule documents.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rule::PolicyRule;
use crate::scope::Scope;

/// Whether a definition is user-authored or platform-supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyType {
    Custom,
    BuiltIn,
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyType::Custom => write!(f, "custom"),
            PolicyType::BuiltIn => write!(f, "built_in"),
        }
    }
}

/// Which resources a definition's rule is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    /// Evaluate against all resource types.
    All,
    /// Evaluate only against resource types that support tags and location.
    Indexed,
}

/// A policy definition — a rule document registered under a name.
///
/// The name is the identity: two definitions with the same name at the same
/// scope are revisions of one resource, never siblings. A changed name is a
/// new resource (names are immutable post-creation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDefinition {
    /// Unique name within the registration scope.
    pub name: String,

    /// User-authored or platform-supplied.
    pub policy_type: PolicyType,

    /// Which resources the rule is evaluated against.
    pub mode: PolicyMode,

    /// Human-readable name shown in compliance views.
    pub display_name: String,

    /// What this policy enforces and why.
    pub description: String,

    /// The condition/effect pair.
    pub rule: PolicyRule,
}

impl PolicyDefinition {
    /// The deterministic resource identifier for this definition at a scope.
    ///
    /// Same name + same scope always yields the same identifier, which is
    /// what makes re-applying an unchanged definition a no-op.
    pub fn definition_id(&self, scope: &Scope) -> String {
        format!(
            "{}/providers/Microsoft.Authorization/policyDefinitions/{}",
            scope, self.name
        )
    }
}
