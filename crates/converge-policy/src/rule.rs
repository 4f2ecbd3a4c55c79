// rule.rs — Policy rule documents: condition/effect pairs.
//
// A rule document is a JSON object with an `if` block (one field comparison)
// and a `then` block (one effect). On the wire the comparison operator is the
// JSON key itself:
//
//   { "if": { "field": "location", "notEquals": "eastus" },
//     "then": { "effect": "deny" } }
//
// Parsing is strict: unknown keys, missing keys, and multiple operator keys
// are all rejected, and the underlying parse failure is preserved verbatim
// so it can be surfaced unchanged to the caller.

use std::collections::BTreeMap;
use std::fmt;

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// Wire shape of a condition block.
///
/// The operator is the JSON key, so the wire struct carries one optional
/// slot per operator; conversion into [`Condition`] enforces that exactly
/// one is present. `deny_unknown_fields` rejects operators we don't know.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConditionDoc {
    field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    equals: Option<String>,
    #[serde(rename = "notEquals", default, skip_serializing_if = "Option::is_none")]
    not_equals: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    like: Option<String>,
    #[serde(rename = "notLike", default, skip_serializing_if = "Option::is_none")]
    not_like: Option<String>,
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    in_values: Option<Vec<String>>,
    #[serde(rename = "notIn", default, skip_serializing_if = "Option::is_none")]
    not_in: Option<Vec<String>>,
}

/// A single field-comparison predicate.
///
/// `Like`/`NotLike` use glob patterns (`east*` matches `eastus` and
/// `eastus2`). Invalid glob patterns never match — fail-closed, not
/// fail-open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ConditionDoc", into = "ConditionDoc")]
pub enum Condition {
    /// Field equals a value exactly.
    Equals { field: String, value: String },
    /// Field differs from a value.
    NotEquals { field: String, value: String },
    /// Field matches a glob pattern.
    Like { field: String, pattern: String },
    /// Field does not match a glob pattern.
    NotLike { field: String, pattern: String },
    /// Field is one of the listed values.
    In { field: String, values: Vec<String> },
    /// Field is none of the listed values.
    NotIn { field: String, values: Vec<String> },
}

impl TryFrom<ConditionDoc> for Condition {
    type Error = PolicyError;

    fn try_from(doc: ConditionDoc) -> Result<Self, Self::Error> {
        let present = [
            doc.equals.is_some(),
            doc.not_equals.is_some(),
            doc.like.is_some(),
            doc.not_like.is_some(),
            doc.in_values.is_some(),
            doc.not_in.is_some(),
        ]
        .iter()
        .filter(|p| **p)
        .count();

        if present != 1 {
            return Err(PolicyError::AmbiguousCondition {
                field: doc.field,
                found: present,
            });
        }

        let field = doc.field;
        Ok(if let Some(value) = doc.equals {
            Condition::Equals { field, value }
        } else if let Some(value) = doc.not_equals {
            Condition::NotEquals { field, value }
        } else if let Some(pattern) = doc.like {
            Condition::Like { field, pattern }
        } else if let Some(pattern) = doc.not_like {
            Condition::NotLike { field, pattern }
        } else if let Some(values) = doc.in_values {
            Condition::In { field, values }
        } else {
            let values = doc.not_in.unwrap_or_default();
            Condition::NotIn { field, values }
        })
    }
}

impl From<Condition> for ConditionDoc {
    fn from(condition: Condition) -> Self {
        let mut doc = ConditionDoc {
            field: String::new(),
            equals: None,
            not_equals: None,
            like: None,
            not_like: None,
            in_values: None,
            not_in: None,
        };
        match condition {
            Condition::Equals { field, value } => {
                doc.field = field;
                doc.equals = Some(value);
            }
            Condition::NotEquals { field, value } => {
                doc.field = field;
                doc.not_equals = Some(value);
            }
            Condition::Like { field, pattern } => {
                doc.field = field;
                doc.like = Some(pattern);
            }
            Condition::NotLike { field, pattern } => {
                doc.field = field;
                doc.not_like = Some(pattern);
            }
            Condition::In { field, values } => {
                doc.field = field;
                doc.in_values = Some(values);
            }
            Condition::NotIn { field, values } => {
                doc.field = field;
                doc.not_in = Some(values);
            }
        }
        doc
    }
}

impl Condition {
    /// The property name this condition inspects.
    pub fn field(&self) -> &str {
        match self {
            Condition::Equals { field, .. }
            | Condition::NotEquals { field, .. }
            | Condition::Like { field, .. }
            | Condition::NotLike { field, .. }
            | Condition::In { field, .. }
            | Condition::NotIn { field, .. } => field,
        }
    }

    /// Evaluate this condition against a resource property bag.
    ///
    /// A property that is absent from the bag never matches — the engine
    /// only enforces on properties it can see.
    pub fn evaluate(&self, properties: &BTreeMap<String, String>) -> bool {
        let Some(actual) = properties.get(self.field()) else {
            return false;
        };

        match self {
            Condition::Equals { value, .. } => actual == value,
            Condition::NotEquals { value, .. } => actual != value,
            Condition::Like { pattern, .. } => matches_glob(pattern, actual),
            Condition::NotLike { pattern, .. } => match Pattern::new(pattern) {
                Ok(p) => !p.matches(actual),
                Err(_) => false, // Invalid patterns never match (fail-closed)
            },
            Condition::In { values, .. } => values.iter().any(|v| v == actual),
            Condition::NotIn { values, .. } => !values.iter().any(|v| v == actual),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Equals { field, value } => write!(f, "{} equals '{}'", field, value),
            Condition::NotEquals { field, value } => write!(f, "{} notEquals '{}'", field, value),
            Condition::Like { field, pattern } => write!(f, "{} like '{}'", field, pattern),
            Condition::NotLike { field, pattern } => write!(f, "{} notLike '{}'", field, pattern),
            Condition::In { field, values } => write!(f, "{} in {:?}", field, values),
            Condition::NotIn { field, values } => write!(f, "{} notIn {:?}", field, values),
        }
    }
}

fn matches_glob(pattern: &str, target: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(p) => p.matches(target),
        Err(_) => false, // Invalid patterns never match (fail-closed)
    }
}

/// What happens when a rule's condition matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyEffect {
    /// Block the request.
    Deny,
    /// Allow the request but record a compliance finding.
    Audit,
    /// Allow the request and add properties to it.
    Append,
    /// The rule is inert — never fires.
    Disabled,
}

impl fmt::Display for PolicyEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyEffect::Deny => write!(f, "deny"),
            PolicyEffect::Audit => write!(f, "audit"),
            PolicyEffect::Append => write!(f, "append"),
            PolicyEffect::Disabled => write!(f, "disabled"),
        }
    }
}

/// The `then` block of a rule document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThenClause {
    /// The effect applied when the condition matches.
    pub effect: PolicyEffect,
}

/// A policy rule — exactly one condition and one effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyRule {
    /// The field-comparison predicate.
    #[serde(rename = "if")]
    pub condition: Condition,

    /// The effect applied when the condition matches.
    #[serde(rename = "then")]
    pub then: ThenClause,
}

impl PolicyRule {
    /// Parse a rule document from JSON text.
    ///
    /// Any failure — malformed JSON, unknown keys, zero or multiple operator
    /// keys — is wrapped in [`PolicyError::RuleParse`] with the underlying
    /// message preserved.
    pub fn parse(json: &str) -> Result<Self, PolicyError> {
        serde_json::from_str(json).map_err(|e| PolicyError::RuleParse {
            reason: e.to_string(),
        })
    }

    /// Serialize this rule back to its canonical JSON document form.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// The rule's effect.
    pub fn effect(&self) -> PolicyEffect {
        self.then.effect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCATION_RULE: &str = r#"{
        "if": { "field": "location", "notEquals": "eastus" },
        "then": { "effect": "deny" }
    }"#;

    fn props(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parse_valid_rule() {
        let rule = PolicyRule::parse(LOCATION_RULE).unwrap();
        assert_eq!(
            rule.condition,
            Condition::NotEquals {
                field: "location".to_string(),
                value: "eastus".to_string(),
            }
        );
        assert_eq!(rule.effect(), PolicyEffect::Deny);
    }

    #[test]
    fn malformed_json_names_the_failure() {
        let err = PolicyRule::parse("{ not json").unwrap_err();
        match err {
            PolicyError::RuleParse { reason } => assert!(!reason.is_empty()),
            other => panic!("expected RuleParse, got {:?}", other),
        }
    }

    #[test]
    fn unknown_operator_key_is_rejected() {
        let doc = r#"{
            "if": { "field": "location", "greaterThan": "5" },
            "then": { "effect": "deny" }
        }"#;
        assert!(PolicyRule::parse(doc).is_err());
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        let doc = r#"{
            "if": { "field": "location", "equals": "eastus" },
            "then": { "effect": "deny" },
            "else": { "effect": "audit" }
        }"#;
        assert!(PolicyRule::parse(doc).is_err());
    }

    #[test]
    fn two_operators_are_rejected() {
        let doc = r#"{
            "if": { "field": "location", "equals": "eastus", "notEquals": "westus" },
            "then": { "effect": "deny" }
        }"#;
        let err = PolicyRule::parse(doc).unwrap_err();
        match err {
            PolicyError::RuleParse { reason } => assert!(reason.contains("exactly one operator")),
            other => panic!("expected RuleParse, got {:?}", other),
        }
    }

    #[test]
    fn zero_operators_are_rejected() {
        let doc = r#"{
            "if": { "field": "location" },
            "then": { "effect": "deny" }
        }"#;
        assert!(PolicyRule::parse(doc).is_err());
    }

    #[test]
    fn not_equals_evaluation() {
        let rule = PolicyRule::parse(LOCATION_RULE).unwrap();
        assert!(rule.condition.evaluate(&props(&[("location", "westus")])));
        assert!(!rule.condition.evaluate(&props(&[("location", "eastus")])));
    }

    #[test]
    fn missing_field_never_matches() {
        let rule = PolicyRule::parse(LOCATION_RULE).unwrap();
        assert!(!rule.condition.evaluate(&props(&[("sku", "standard")])));
    }

    #[test]
    fn like_uses_glob_patterns() {
        let condition = Condition::Like {
            field: "location".to_string(),
            pattern: "east*".to_string(),
        };
        assert!(condition.evaluate(&props(&[("location", "eastus")])));
        assert!(condition.evaluate(&props(&[("location", "eastus2")])));
        assert!(!condition.evaluate(&props(&[("location", "westus")])));
    }

    #[test]
    fn in_membership() {
        let condition = Condition::In {
            field: "location".to_string(),
            values: vec!["eastus".to_string(), "eastus2".to_string()],
        };
        assert!(condition.evaluate(&props(&[("location", "eastus2")])));
        assert!(!condition.evaluate(&props(&[("location", "westeurope")])));
    }

    #[test]
    fn wire_format_round_trip_preserves_operator_keys() {
        let rule = PolicyRule::parse(LOCATION_RULE).unwrap();
        let json = serde_json::to_string(&rule).unwrap();
        assert!(json.contains("\"notEquals\""));
        assert!(json.contains("\"if\""));
        assert!(json.contains("\"then\""));
        let restored = PolicyRule::parse(&json).unwrap();
        assert_eq!(rule, restored);
    }

    #[test]
    fn effect_serializes_lowercase() {
        let json = serde_json::to_string(&PolicyEffect::Deny).unwrap();
        assert_eq!(json, "\"deny\"");
        let json = serde_json::to_string(&PolicyEffect::Audit).unwrap();
        assert_eq!(json, "\"audit\"");
    }
}
