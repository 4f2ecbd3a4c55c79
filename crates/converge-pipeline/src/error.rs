// error.rs — Error types for the pipeline subsystem.

use thiserror::Error;

/// Errors that can occur while gating or driving a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The trigger event does not match any entry guard (e.g., a push to a
    /// feature branch, or a pull request against a non-default branch).
    #[error("trigger {trigger} does not enter any pipeline path: {reason}")]
    InvalidTrigger { trigger: String, reason: String },

    /// Invalid lifecycle transition (e.g., Validated → Applying).
    #[error("invalid pipeline transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// A secret the manifest requires is absent from the run's sources.
    #[error("required secret '{name}' is not set")]
    MissingSecret { name: String },

    /// A pipeline manifest failed to parse.
    #[error("manifest parse error: {0}")]
    ManifestParse(#[from] serde_yaml::Error),

    /// A pipeline manifest could not be read.
    #[error("cannot read manifest at {path}: {source}")]
    ManifestIo {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
