// error.rs — Error types for the planning subsystem.

use thiserror::Error;

/// Errors that can occur while diffing or handling plans.
#[derive(Debug, Error)]
pub enum PlanError {
    /// An assignment references a definition that exists neither in the
    /// declaration nor in live state. Applying it would fail at the control
    /// plane, so the diff fails deterministically instead.
    #[error("assignment '{assignment}' references unknown definition '{definition}'")]
    DanglingReference {
        assignment: String,
        definition: String,
    },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
