//! # converge-state
//!
//! Versioned state storage for Converge.
//!
//! Live state is never ambient shared memory: every reader and writer goes
//! through a [`StateBackend`], which exposes an explicitly-locked,
//! read-modify-write interface over a [`StateSnapshot`]. The shipped
//! backend ([`LocalFileBackend`]) stores one JSON snapshot plus a lock
//! sidecar file; a second lock attempt while a lock is held fails fast
//! with [`StateError::LockHeld`] rather than blocking or corrupting state.
//!
//! ## Key invariants
//!
//! - **Serial discipline**: each successful apply writes serial N+1 against
//!   a snapshot read at serial N. Any other write is stale and rejected.
//! - **Lock before write**: `write` demands the lock token returned by
//!   `lock`; there is no unlocked write path.
//! - **History is append-only**: every applied snapshot is recorded in a
//!   hash-chained JSONL log ([`HistoryLog`]) whose integrity is verifiable
//!   after the fact.

pub mod backend;
pub mod error;
pub mod history;
pub mod snapshot;

pub use backend::{LocalFileBackend, StateBackend, StateLock};
pub use error::StateError;
pub use history::{HistoryEntry, HistoryLog};
pub use snapshot::StateSnapshot;
