// error.rs — Error types for the state subsystem.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during state operations.
#[derive(Debug, Error)]
pub enum StateError {
    /// Another run holds the state lock. The second caller fails fast and
    /// performs no mutation; re-run once the holder finishes.
    #[error("state is locked by '{holder}' since {since}")]
    LockHeld { holder: String, since: String },

    /// A write or unlock presented a lock token that does not match the
    /// lock on disk.
    #[error("lock token mismatch: lock file holds '{on_disk}', caller presented '{presented}'")]
    LockMismatch { on_disk: String, presented: String },

    /// A write or unlock was attempted with no lock on disk.
    #[error("no state lock is held at {path}")]
    NotLocked { path: PathBuf },

    /// A write presented a snapshot whose serial is not exactly one past
    /// the stored serial.
    #[error("stale snapshot: expected serial {expected}, got {actual}")]
    StaleSnapshot { expected: u64, actual: u64 },

    /// Filesystem failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The history log's hash chain is broken at a line.
    #[error("history integrity violation at line {line}: expected previous_hash {expected}, found {actual}")]
    HistoryIntegrity {
        line: usize,
        expected: String,
        actual: String,
    },
}
