// change.rs — Resource change representations.
//
// A ResourceChange describes what the apply phase will do to one resource.
// The PlannedAction wraps it with the logical address; the Plan orders and
// seals the whole set.

use serde::{Deserialize, Serialize};

use converge_policy::{PolicyAssignment, PolicyDefinition};

/// The full declared shape of one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceSpec {
    /// A policy definition.
    Definition(PolicyDefinition),
    /// A policy assignment.
    Assignment(PolicyAssignment),
}

impl ResourceSpec {
    /// The logical address of this resource (`policy_definition.<name>` or
    /// `policy_assignment.<name>`).
    pub fn address(&self) -> String {
        match self {
            ResourceSpec::Definition(d) => format!("policy_definition.{}", d.name),
            ResourceSpec::Assignment(a) => format!("policy_assignment.{}", a.name),
        }
    }
}

/// What the apply phase will do to one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ResourceChange {
    /// The resource is declared but not live.
    Create { after: ResourceSpec },
    /// The resource is live but its declared shape differs.
    Update {
        before: ResourceSpec,
        after: ResourceSpec,
    },
    /// The resource is live but no longer declared (destructive applies only).
    Delete { before: ResourceSpec },
    /// Declared and live shapes already agree.
    NoOp,
}

impl ResourceChange {
    /// Whether this change mutates live state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, ResourceChange::NoOp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_policy::{
        Condition, PolicyEffect, PolicyMode, PolicyRule, PolicyType, Scope, ThenClause,
    };

    fn spec() -> ResourceSpec {
        ResourceSpec::Definition(PolicyDefinition {
            name: "allowed-locations".to_string(),
            policy_type: PolicyType::Custom,
            mode: PolicyMode::All,
            display_name: "Allowed locations".to_string(),
            description: String::new(),
            rule: PolicyRule {
                condition: Condition::NotEquals {
                    field: "location".to_string(),
                    value: "eastus".to_string(),
                },
                then: ThenClause {
                    effect: PolicyEffect::Deny,
                },
            },
        })
    }

    #[test]
    fn definition_address() {
        assert_eq!(spec().address(), "policy_definition.allowed-locations");
    }

    #[test]
    fn assignment_address() {
        let spec = ResourceSpec::Assignment(PolicyAssignment {
            name: "restrict".to_string(),
            display_name: "Restrict".to_string(),
            definition_ref: "allowed-locations".to_string(),
            scope: Scope::Subscription("s".to_string()),
        });
        assert_eq!(spec.address(), "policy_assignment.restrict");
    }

    #[test]
    fn change_serializes_with_op_tag() {
        let change = ResourceChange::Create { after: spec() };
        let json = serde_json::to_string(&change).unwrap();
        assert!(json.contains("\"op\":\"create\""));
        let restored: ResourceChange = serde_json::from_str(&json).unwrap();
        assert_eq!(change, restored);
    }

    #[test]
    fn noop_is_not_a_mutation() {
        assert!(!ResourceChange::NoOp.is_mutation());
        assert!(ResourceChange::Create { after: spec() }.is_mutation());
    }
}
