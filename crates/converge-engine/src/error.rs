// error.rs — Error types for the engine subsystem.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use converge_credentials::CredentialError;
use converge_plan::PlanError;
use converge_state::StateError;

use crate::declaration::ValidationReport;

/// Errors that can occur while driving a reconciliation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Authentication failure at init — a credential is missing or empty.
    #[error("authentication failure: {0}")]
    Credential(#[from] CredentialError),

    /// The declaration failed validation; the report lists every issue.
    #[error("declaration failed validation: {report}")]
    InvalidDeclaration { report: ValidationReport },

    /// Diffing failed (e.g., a dangling definition reference).
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// The state layer failed (lock contention, stale serial, I/O).
    #[error(transparent)]
    State(#[from] StateError),

    /// The plan was computed against a serial that is no longer live.
    /// Re-run plan against the current state.
    #[error("plan is stale: computed against serial {plan_serial}, live state is at serial {live_serial}")]
    StalePlan { plan_serial: u64, live_serial: u64 },

    /// The plan's content hash does not match its actions.
    #[error("plan {plan_id} failed integrity verification")]
    PlanIntegrity { plan_id: Uuid },

    /// Filesystem failure while loading configuration or declarations.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A TOML document failed to parse.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}
