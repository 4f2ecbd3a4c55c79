// declaration.rs — The declared-resource interface.
//
// A Declaration is the version-controlled desired state: TOML tables keyed
// by logical name, one per definition and assignment. Rule documents are
// inline JSON strings or sibling files referenced by path.
//
//   [definition.allowed-locations]
//   display_name = "Allowed locations"
//   rule = '''{ "if": { "field": "location", "notEquals": "eastus" },
//               "then": { "effect": "deny" } }'''
//
//   [assignment.restrict-locations]
//   display_name = "Restrict locations"
//   definition = "allowed-locations"
//   scope = "/subscriptions/abc-123"
//
// Resolution turns the raw documents into typed resources and reports
// every problem it finds — error-list semantics, not first-error, so one
// validate run shows the whole damage.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use converge_plan::ResourceSet;
use converge_policy::{
    PolicyAssignment, PolicyDefinition, PolicyMode, PolicyRule, PolicyType, Scope,
};

use crate::error::EngineError;

fn default_policy_type() -> PolicyType {
    PolicyType::Custom
}

fn default_mode() -> PolicyMode {
    PolicyMode::All
}

/// Raw definition table from a declaration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefinitionDoc {
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_policy_type")]
    pub policy_type: PolicyType,
    #[serde(default = "default_mode")]
    pub mode: PolicyMode,
    /// Inline rule document (JSON text).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    /// Path to a rule document file, relative to the declaration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_file: Option<PathBuf>,
}

/// Raw assignment table from a declaration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignmentDoc {
    pub display_name: String,
    /// Name of the definition this assignment activates.
    pub definition: String,
    /// Scope resource-ID. Defaults to the engine's default scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// One problem found while resolving a declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// The logical address the problem is attached to.
    pub address: String,
    /// What is wrong, with underlying parse failures preserved verbatim.
    pub message: String,
}

/// Everything wrong with a declaration, in one pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn ok(&self) -> bool {
        self.issues.is_empty()
    }

    fn push(&mut self, address: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            address: address.into(),
            message: message.into(),
        });
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ok() {
            return write!(f, "ok");
        }
        write!(f, "{} issue(s):", self.issues.len())?;
        for issue in &self.issues {
            write!(f, " [{}] {};", issue.address, issue.message)?;
        }
        Ok(())
    }
}

/// The declared desired state, parsed but not yet resolved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Declaration {
    #[serde(default)]
    pub definition: BTreeMap<String, DefinitionDoc>,
    #[serde(default)]
    pub assignment: BTreeMap<String, AssignmentDoc>,
    /// Directory rule_file paths resolve against. Set by `load`.
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl Declaration {
    /// Parse a declaration from TOML text. rule_file paths resolve against
    /// the current directory.
    pub fn from_toml(text: &str) -> Result<Self, EngineError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a declaration file. rule_file paths resolve against the file's
    /// directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut declaration: Self = toml::from_str(&text)?;
        declaration.base_dir = path.parent().map(Path::to_path_buf);
        Ok(declaration)
    }

    /// Resolve into typed resources, collecting every issue.
    ///
    /// Definitions register at `default_scope`; assignments without an
    /// explicit scope bind there too. On any issue the whole report comes
    /// back as the error — partial desired state never leaves this
    /// function.
    pub fn resolve(&self, default_scope: &Scope) -> Result<ResourceSet, ValidationReport> {
        let mut report = ValidationReport::default();
        let mut resources = ResourceSet::default();

        for (name, doc) in &self.definition {
            let address = format!("policy_definition.{}", name);
            let rule_text = match (&doc.rule, &doc.rule_file) {
                (Some(inline), None) => Some(inline.clone()),
                (None, Some(file)) => {
                    let path = match &self.base_dir {
                        Some(dir) => dir.join(file),
                        None => file.clone(),
                    };
                    match std::fs::read_to_string(&path) {
                        Ok(text) => Some(text),
                        Err(e) => {
                            report.push(
                                &address,
                                format!("cannot read rule file '{}': {}", path.display(), e),
                            );
                            None
                        }
                    }
                }
                (Some(_), Some(_)) => {
                    report.push(&address, "both rule and rule_file are set; pick one");
                    None
                }
                (None, None) => {
                    report.push(&address, "one of rule or rule_file is required");
                    None
                }
            };

            if let Some(text) = rule_text {
                match PolicyRule::parse(&text) {
                    Ok(rule) => resources.insert_definition(PolicyDefinition {
                        name: name.clone(),
                        policy_type: doc.policy_type,
                        mode: doc.mode,
                        display_name: doc.display_name.clone(),
                        description: doc.description.clone(),
                        rule,
                    }),
                    Err(e) => report.push(&address, e.to_string()),
                }
            }
        }

        for (name, doc) in &self.assignment {
            let address = format!("policy_assignment.{}", name);

            if !self.definition.contains_key(&doc.definition) {
                report.push(
                    &address,
                    format!("references undeclared definition '{}'", doc.definition),
                );
            }

            let scope = match &doc.scope {
                Some(raw) => match raw.parse::<Scope>() {
                    Ok(scope) => Some(scope),
                    Err(e) => {
                        report.push(&address, e.to_string());
                        None
                    }
                },
                None => Some(default_scope.clone()),
            };

            if let Some(scope) = scope {
                resources.insert_assignment(PolicyAssignment {
                    name: name.clone(),
                    display_name: doc.display_name.clone(),
                    definition_ref: doc.definition.clone(),
                    scope,
                });
            }
        }

        if report.ok() {
            debug!(
                definitions = resources.definitions.len(),
                assignments = resources.assignments.len(),
                "declaration resolved"
            );
            Ok(resources)
        } else {
            Err(report)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
        [definition.allowed-locations]
        display_name = "Allowed locations"
        description = "Only eastus"
        rule = '''
        { "if": { "field": "location", "notEquals": "eastus" },
          "then": { "effect": "deny" } }
        '''

        [assignment.restrict-locations]
        display_name = "Restrict locations"
        definition = "allowed-locations"
    "#;

    fn scope() -> Scope {
        Scope::Subscription("sub-1".to_string())
    }

    #[test]
    fn valid_declaration_resolves() {
        let declaration = Declaration::from_toml(VALID).unwrap();
        let resources = declaration.resolve(&scope()).unwrap();
        assert_eq!(resources.definitions.len(), 1);
        assert_eq!(resources.assignments.len(), 1);
        // Assignment without explicit scope binds to the default.
        assert_eq!(
            resources.assignments["restrict-locations"].scope,
            scope()
        );
    }

    #[test]
    fn bad_rule_json_is_reported_with_the_parse_failure() {
        let text = r#"
            [definition.broken]
            display_name = "Broken"
            rule = "{ not json"
        "#;
        let declaration = Declaration::from_toml(text).unwrap();
        let report = declaration.resolve(&scope()).unwrap_err();
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].address, "policy_definition.broken");
        assert!(report.issues[0].message.contains("invalid policy rule document"));
    }

    #[test]
    fn undeclared_definition_reference_is_reported() {
        let text = r#"
            [assignment.orphan]
            display_name = "Orphan"
            definition = "missing"
        "#;
        let declaration = Declaration::from_toml(text).unwrap();
        let report = declaration.resolve(&scope()).unwrap_err();
        assert!(report.issues[0].message.contains("undeclared definition"));
    }

    #[test]
    fn all_issues_reported_in_one_pass() {
        let text = r#"
            [definition.broken]
            display_name = "Broken"
            rule = "{ not json"

            [definition.empty]
            display_name = "Empty"

            [assignment.orphan]
            display_name = "Orphan"
            definition = "missing"
            scope = "garbage"
        "#;
        let declaration = Declaration::from_toml(text).unwrap();
        let report = declaration.resolve(&scope()).unwrap_err();
        // broken rule + missing rule + undeclared ref + bad scope
        assert_eq!(report.issues.len(), 4);
    }

    #[test]
    fn rule_and_rule_file_together_are_rejected() {
        let text = r#"
            [definition.both]
            display_name = "Both"
            rule = "{}"
            rule_file = "rule.json"
        "#;
        let declaration = Declaration::from_toml(text).unwrap();
        let report = declaration.resolve(&scope()).unwrap_err();
        assert!(report.issues.iter().any(|i| i.message.contains("pick one")));
    }

    #[test]
    fn rule_file_loads_relative_to_declaration() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("rule.json"),
            r#"{ "if": { "field": "location", "equals": "eastus" },
                 "then": { "effect": "audit" } }"#,
        )
        .unwrap();
        let declaration_path = dir.path().join("main.toml");
        std::fs::write(
            &declaration_path,
            r#"
            [definition.from-file]
            display_name = "From file"
            rule_file = "rule.json"
            "#,
        )
        .unwrap();

        let declaration = Declaration::load(&declaration_path).unwrap();
        let resources = declaration.resolve(&scope()).unwrap();
        assert!(resources.definitions.contains_key("from-file"));
    }

    #[test]
    fn unknown_table_key_fails_parse() {
        let text = r#"
            [definition.x]
            display_name = "X"
            rule = "{}"
            severity = "high"
        "#;
        assert!(Declaration::from_toml(text).is_err());
    }
}
