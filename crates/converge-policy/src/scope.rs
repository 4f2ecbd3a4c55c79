// scope.rs — Cloud scope identifiers and hierarchy containment.
//
// A scope is the hierarchy level at which a policy assignment applies:
// management group, subscription, or resource group. Scopes parse from and
// display as the canonical resource-ID forms:
//
//   /providers/Microsoft.Management/managementGroups/<name>
//   /subscriptions/<id>
//   /subscriptions/<id>/resourceGroups/<name>
//
// Containment defines the blast radius of an assignment: a subscription
// scope contains every resource group under it.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// A level in the cloud resource hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Scope {
    /// A management group (the widest blast radius).
    ManagementGroup(String),
    /// A subscription.
    Subscription(String),
    /// A resource group within a subscription (the narrowest).
    ResourceGroup {
        subscription_id: String,
        name: String,
    },
}

fn subscription_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/subscriptions/([A-Za-z0-9-]+)$").unwrap())
}

fn resource_group_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^/subscriptions/([A-Za-z0-9-]+)/resourceGroups/([^/]+)$").unwrap()
    })
}

fn management_group_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^/providers/Microsoft\.Management/managementGroups/([^/]+)$").unwrap()
    })
}

impl Scope {
    /// Whether this scope contains `other`.
    ///
    /// A scope always contains itself. A subscription contains the resource
    /// groups under it. Management-group membership of subscriptions is not
    /// resolvable without the live hierarchy, so a management group contains
    /// only itself here.
    pub fn contains(&self, other: &Scope) -> bool {
        match (self, other) {
            (Scope::ManagementGroup(a), Scope::ManagementGroup(b)) => a == b,
            (Scope::Subscription(a), Scope::Subscription(b)) => a == b,
            (Scope::Subscription(a), Scope::ResourceGroup { subscription_id, .. }) => {
                a == subscription_id
            }
            (
                Scope::ResourceGroup {
                    subscription_id: a_sub,
                    name: a_name,
                },
                Scope::ResourceGroup {
                    subscription_id: b_sub,
                    name: b_name,
                },
            ) => a_sub == b_sub && a_name == b_name,
            _ => false,
        }
    }
}

impl FromStr for Scope {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(caps) = resource_group_re().captures(s) {
            return Ok(Scope::ResourceGroup {
                subscription_id: caps[1].to_string(),
                name: caps[2].to_string(),
            });
        }
        if let Some(caps) = subscription_re().captures(s) {
            return Ok(Scope::Subscription(caps[1].to_string()));
        }
        if let Some(caps) = management_group_re().captures(s) {
            return Ok(Scope::ManagementGroup(caps[1].to_string()));
        }
        Err(PolicyError::InvalidScope {
            scope: s.to_string(),
        })
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::ManagementGroup(name) => {
                write!(f, "/providers/Microsoft.Management/managementGroups/{}", name)
            }
            Scope::Subscription(id) => write!(f, "/subscriptions/{}", id),
            Scope::ResourceGroup {
                subscription_id,
                name,
            } => write!(f, "/subscriptions/{}/resourceGroups/{}", subscription_id, name),
        }
    }
}

impl TryFrom<String> for Scope {
    type Error = PolicyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.to_string()
    }
}
