// manifest.rs — Pipeline manifests: branch filters and required secrets.
//
// A manifest is the YAML document that declares when a pipeline may run
// and what it needs in its environment:
//
//   name: policy-delivery
//   on:
//     pull_request:
//       branches: [main]
//     push:
//       branches: [main]
//   required_secrets:
//     - ARM_CLIENT_ID
//     - ARM_CLIENT_SECRET
//     - ARM_SUBSCRIPTION_ID
//     - ARM_TENANT_ID
//
// `authorize` is the single gate: the trigger must match a filter and
// every required secret must be present, or no run starts.

use std::path::Path;

use serde::{Deserialize, Serialize};

use converge_credentials::SecretSource;

use crate::error::PipelineError;
use crate::run::TriggerEvent;

/// Which branches an event kind fires for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BranchRule {
    pub branches: Vec<String>,
}

impl BranchRule {
    fn matches(&self, branch: &str) -> bool {
        self.branches.iter().any(|b| b == branch)
    }
}

/// The event kinds a pipeline listens to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<BranchRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push: Option<BranchRule>,
}

/// A pipeline manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineManifest {
    pub name: String,
    pub on: TriggerRules,
    #[serde(default)]
    pub required_secrets: Vec<String>,
}

impl PipelineManifest {
    /// Parse a manifest from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, PipelineError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load a manifest file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let text =
            std::fs::read_to_string(path.as_ref()).map_err(|source| PipelineError::ManifestIo {
                path: path.as_ref().to_path_buf(),
                source,
            })?;
        Self::from_yaml(&text)
    }

    /// Whether the trigger matches one of this manifest's filters.
    pub fn matches(&self, trigger: &TriggerEvent) -> bool {
        match trigger {
            TriggerEvent::PullRequest { target_branch, .. } => self
                .on
                .pull_request
                .as_ref()
                .is_some_and(|rule| rule.matches(target_branch)),
            TriggerEvent::Push { branch } => self
                .on
                .push
                .as_ref()
                .is_some_and(|rule| rule.matches(branch)),
        }
    }

    /// The required secrets absent from a source.
    pub fn missing_secrets(&self, secrets: &dyn SecretSource) -> Vec<String> {
        self.required_secrets
            .iter()
            .filter(|name| secrets.get(name).is_none())
            .cloned()
            .collect()
    }

    /// Gate a run: the trigger must match and every required secret must
    /// be present.
    pub fn authorize(
        &self,
        trigger: &TriggerEvent,
        secrets: &dyn SecretSource,
    ) -> Result<(), PipelineError> {
        if !self.matches(trigger) {
            return Err(PipelineError::InvalidTrigger {
                trigger: trigger.to_string(),
                reason: format!("no filter in manifest '{}' matches", self.name),
            });
        }
        if let Some(name) = self.missing_secrets(secrets).into_iter().next() {
            return Err(PipelineError::MissingSecret { name });
        }
        Ok(())
    }
}
