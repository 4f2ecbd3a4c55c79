// engine.rs — Enforcement evaluation against applied assignments.
//
// The EnforcementEngine models what the cloud control plane does at
// resource-creation time. Every incoming resource request is checked
// against every assignment whose scope contains the request:
//
// 1. Does the assignment's scope contain the request scope? → No → skip
// 2. Does the referenced definition exist and carry an active rule? → No → skip
// 3. Does the rule's condition match the request properties? → No → skip
// 4. Effect `deny` → Denied (first deny wins, evaluation stops)
// 5. Effect `audit` → remember the finding, keep evaluating
//
// A request no assignment objects to is Allowed. Audit findings never
// block; the first one is reported on an otherwise-allowed request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assignment::PolicyAssignment;
use crate::definition::PolicyDefinition;
use crate::rule::PolicyEffect;
use crate::scope::Scope;

/// A resource request — submitted to the engine for an enforcement decision.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    /// The resource type being created (e.g., "resourceGroup").
    pub resource_kind: String,
    /// Where the resource would be created.
    pub scope: Scope,
    /// The request's properties (e.g., location = "westus").
    pub properties: BTreeMap<String, String>,
}

impl ResourceRequest {
    /// Convenience constructor for the common single-property case.
    pub fn new(resource_kind: impl Into<String>, scope: Scope) -> Self {
        Self {
            resource_kind: resource_kind.into(),
            scope,
            properties: BTreeMap::new(),
        }
    }

    /// Set a property and return self (builder pattern).
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// The result of an enforcement evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum EnforcementDecision {
    /// No assignment objected — the request may proceed.
    Allowed,
    /// A deny rule matched — the request is blocked.
    Denied { assignment: String, reason: String },
    /// An audit rule matched — the request proceeds with a finding recorded.
    Audited { assignment: String, reason: String },
}

/// The enforcement engine — evaluates requests against applied policy.
///
/// Holds the definitions and assignments from a converged state snapshot.
/// Definitions are keyed by name because that is how assignments refer to
/// them.
#[derive(Debug, Default)]
pub struct EnforcementEngine {
    definitions: BTreeMap<String, PolicyDefinition>,
    assignments: Vec<PolicyAssignment>,
}

impl EnforcementEngine {
    /// Create an empty engine (allows everything — no policy, no objection).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. Overwrites any existing definition of the
    /// same name.
    pub fn insert_definition(&mut self, definition: PolicyDefinition) {
        self.definitions.insert(definition.name.clone(), definition);
    }

    /// Activate an assignment.
    pub fn insert_assignment(&mut self, assignment: PolicyAssignment) {
        self.assignments.push(assignment);
    }

    /// Evaluate a resource request and return a decision.
    ///
    /// The first matching `deny` wins. `audit` findings accumulate; the
    /// first is reported if nothing denies.
    pub fn evaluate(&self, request: &ResourceRequest) -> EnforcementDecision {
        let mut first_audit: Option<EnforcementDecision> = None;

        for assignment in &self.assignments {
            if !assignment.scope.contains(&request.scope) {
                continue;
            }

            // An assignment whose reference no longer resolves is inert.
            // The reconciliation layer prevents this from being applied.
            let Some(definition) = self.definitions.get(&assignment.definition_ref) else {
                debug!(
                    assignment = %assignment.name,
                    definition = %assignment.definition_ref,
                    "assignment references a missing definition; skipping"
                );
                continue;
            };

            let rule = &definition.rule;
            if rule.effect() == PolicyEffect::Disabled {
                continue;
            }
            if !rule.condition.evaluate(&request.properties) {
                continue;
            }

            let reason = format!(
                "rule '{}' matched: {}",
                definition.name, rule.condition
            );
            match rule.effect() {
                PolicyEffect::Deny => {
                    return EnforcementDecision::Denied {
                        assignment: assignment.name.clone(),
                        reason,
                    };
                }
                PolicyEffect::Audit | PolicyEffect::Append => {
                    // Append is modeled as a recorded finding; property
                    // mutation happens in the live control plane, not here.
                    if first_audit.is_none() {
                        first_audit = Some(EnforcementDecision::Audited {
                            assignment: assignment.name.clone(),
                            reason,
                        });
                    }
                }
                PolicyEffect::Disabled => {}
            }
        }

        first_audit.unwrap_or(EnforcementDecision::Allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{PolicyMode, PolicyType};
    use crate::rule::{Condition, PolicyRule, ThenClause};

    fn definition(name: &str, condition: Condition, effect: PolicyEffect) -> PolicyDefinition {
        PolicyDefinition {
            name: name.to_string(),
            policy_type: PolicyType::Custom,
            mode: PolicyMode::All,
            display_name: name.to_string(),
            description: String::new(),
            rule: PolicyRule {
                condition,
                then: ThenClause { effect },
            },
        }
    }

    fn assignment(name: &str, definition_ref: &str, scope: Scope) -> PolicyAssignment {
        PolicyAssignment {
            name: name.to_string(),
            display_name: name.to_string(),
            definition_ref: definition_ref.to_string(),
            scope,
        }
    }

    fn location_engine(effect: PolicyEffect) -> EnforcementEngine {
        let mut engine = EnforcementEngine::new();
        engine.insert_definition(definition(
            "allowed-locations",
            Condition::NotEquals {
                field: "location".to_string(),
                value: "eastus".to_string(),
            },
            effect,
        ));
        engine.insert_assignment(assignment(
            "restrict-locations",
            "allowed-locations",
            Scope::Subscription("sub-1".to_string()),
        ));
        engine
    }

    fn rg_request(location: &str) -> ResourceRequest {
        ResourceRequest::new(
            "resourceGroup",
            Scope::ResourceGroup {
                subscription_id: "sub-1".to_string(),
                name: "rg-app".to_string(),
            },
        )
        .with_property("location", location)
    }

    #[test]
    fn deny_out_of_region_request() {
        let engine = location_engine(PolicyEffect::Deny);
        match engine.evaluate(&rg_request("westus")) {
            EnforcementDecision::Denied { assignment, reason } => {
                assert_eq!(assignment, "restrict-locations");
                assert!(reason.contains("notEquals"));
            }
            other => panic!("expected Denied, got {:?}", other),
        }
    }

    #[test]
    fn allow_in_region_request() {
        let engine = location_engine(PolicyEffect::Deny);
        assert_eq!(
            engine.evaluate(&rg_request("eastus")),
            EnforcementDecision::Allowed
        );
    }

    #[test]
    fn out_of_scope_request_is_untouched() {
        let engine = location_engine(PolicyEffect::Deny);
        let request = ResourceRequest::new(
            "resourceGroup",
            Scope::ResourceGroup {
                subscription_id: "sub-2".to_string(),
                name: "rg-app".to_string(),
            },
        )
        .with_property("location", "westus");
        assert_eq!(engine.evaluate(&request), EnforcementDecision::Allowed);
    }

    #[test]
    fn audit_records_but_allows() {
        let engine = location_engine(PolicyEffect::Audit);
        match engine.evaluate(&rg_request("westus")) {
            EnforcementDecision::Audited { assignment, .. } => {
                assert_eq!(assignment, "restrict-locations");
            }
            other => panic!("expected Audited, got {:?}", other),
        }
    }

    #[test]
    fn disabled_rule_never_fires() {
        let engine = location_engine(PolicyEffect::Disabled);
        assert_eq!(
            engine.evaluate(&rg_request("westus")),
            EnforcementDecision::Allowed
        );
    }

    #[test]
    fn deny_wins_over_audit() {
        let mut engine = location_engine(PolicyEffect::Audit);
        engine.insert_definition(definition(
            "deny-west",
            Condition::Equals {
                field: "location".to_string(),
                value: "westus".to_string(),
            },
            PolicyEffect::Deny,
        ));
        engine.insert_assignment(assignment(
            "deny-west-sub",
            "deny-west",
            Scope::Subscription("sub-1".to_string()),
        ));
        match engine.evaluate(&rg_request("westus")) {
            EnforcementDecision::Denied { assignment, .. } => {
                assert_eq!(assignment, "deny-west-sub");
            }
            other => panic!("expected Denied, got {:?}", other),
        }
    }

    #[test]
    fn dangling_assignment_is_inert() {
        let mut engine = EnforcementEngine::new();
        engine.insert_assignment(assignment(
            "orphan",
            "nonexistent",
            Scope::Subscription("sub-1".to_string()),
        ));
        assert_eq!(
            engine.evaluate(&rg_request("westus")),
            EnforcementDecision::Allowed
        );
    }

    #[test]
    fn empty_engine_allows_everything() {
        let engine = EnforcementEngine::new();
        assert_eq!(
            engine.evaluate(&rg_request("anywhere")),
            EnforcementDecision::Allowed
        );
    }
}
