//! # converge-credentials
//!
//! Cloud credential loading for Converge.
//!
//! Four opaque secrets identify the caller to the cloud control plane:
//! client id, client secret, subscription id, tenant id. They are injected
//! as environment variables into every run that talks to the provider;
//! absence of any one is an authentication failure at `init`, before
//! anything else happens.
//!
//! Secrets come through the [`SecretSource`] trait so tests and pipelines
//! can inject values without touching the process environment. The
//! [`Debug`] impl never prints the client secret.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use tracing::debug;

/// Environment variable carrying the service principal's client id.
pub const CLIENT_ID_VAR: &str = "ARM_CLIENT_ID";
/// Environment variable carrying the service principal's client secret.
pub const CLIENT_SECRET_VAR: &str = "ARM_CLIENT_SECRET";
/// Environment variable carrying the target subscription id.
pub const SUBSCRIPTION_ID_VAR: &str = "ARM_SUBSCRIPTION_ID";
/// Environment variable carrying the tenant id.
pub const TENANT_ID_VAR: &str = "ARM_TENANT_ID";

/// All variables a run must carry to authenticate.
pub const REQUIRED_VARS: [&str; 4] = [
    CLIENT_ID_VAR,
    CLIENT_SECRET_VAR,
    SUBSCRIPTION_ID_VAR,
    TENANT_ID_VAR,
];

/// Errors that can occur while loading credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// A required secret is absent — authentication cannot proceed.
    #[error("missing required credential variable '{name}'")]
    MissingVariable { name: String },

    /// A secret is present but empty.
    #[error("credential variable '{name}' is empty")]
    EmptyVariable { name: String },
}

/// Where secrets come from.
///
/// The process environment in production; a map in tests and in pipeline
/// manifest checks.
pub trait SecretSource {
    /// Look up a secret by name. `None` means absent.
    fn get(&self, name: &str) -> Option<String>;
}

/// The process environment as a secret source.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl SecretSource for EnvSource {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// A fixed map of secrets, for tests and static injection.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    values: BTreeMap<String, String>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret and return self (builder pattern).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// A source carrying all four required variables with placeholder
    /// values. Test convenience.
    pub fn complete() -> Self {
        let mut source = Self::new();
        for var in REQUIRED_VARS {
            source.values.insert(var.to_string(), format!("test-{}", var.to_lowercase()));
        }
        source
    }
}

impl SecretSource for StaticSource {
    fn get(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

/// The four secrets identifying a run to the cloud control plane.
#[derive(Clone)]
pub struct CloudCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub subscription_id: String,
    pub tenant_id: String,
}

impl CloudCredentials {
    /// Load all four secrets from a source.
    ///
    /// Fails on the first absent or empty variable, naming it — this is
    /// the authentication failure surfaced at `init`.
    pub fn load(source: &dyn SecretSource) -> Result<Self, CredentialError> {
        let mut values = Vec::with_capacity(REQUIRED_VARS.len());
        for name in REQUIRED_VARS {
            let value = source
                .get(name)
                .ok_or_else(|| CredentialError::MissingVariable {
                    name: name.to_string(),
                })?;
            if value.is_empty() {
                return Err(CredentialError::EmptyVariable {
                    name: name.to_string(),
                });
            }
            values.push(value);
        }

        let mut values = values.into_iter();
        let credentials = Self {
            client_id: values.next().unwrap_or_default(),
            client_secret: values.next().unwrap_or_default(),
            subscription_id: values.next().unwrap_or_default(),
            tenant_id: values.next().unwrap_or_default(),
        };
        debug!(
            client_id = %credentials.client_id,
            subscription_id = %credentials.subscription_id,
            "credentials loaded"
        );
        Ok(credentials)
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, CredentialError> {
        Self::load(&EnvSource)
    }
}

// The client secret never appears in Debug output — credentials get logged
// and attached to error reports.
impl fmt::Debug for CloudCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("subscription_id", &self.subscription_id)
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}
