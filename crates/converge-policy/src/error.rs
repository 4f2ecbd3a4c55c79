// error.rs — Error types for the policy subsystem.

use thiserror::Error;

/// Errors that can occur while parsing or evaluating policy material.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A rule document failed to parse. The reason carries the underlying
    /// parse failure verbatim so callers can surface it unchanged.
    #[error("invalid policy rule document: {reason}")]
    RuleParse { reason: String },

    /// A condition block does not carry exactly one operator key.
    #[error("condition on field '{field}' must carry exactly one operator, found {found}")]
    AmbiguousCondition { field: String, found: usize },

    /// A scope string is not a recognized cloud resource identifier.
    #[error("invalid scope identifier: '{scope}'")]
    InvalidScope { scope: String },
}
