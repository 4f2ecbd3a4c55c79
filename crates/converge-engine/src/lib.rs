//! # converge-engine
//!
//! The reconciliation driver for Converge.
//!
//! A [`Declaration`] (TOML) names the desired policy definitions and
//! assignments. The [`Reconciler`] converges live state to match:
//!
//! - `init` — load credentials and open the state backend. Missing
//!   credentials fail here, before anything else happens.
//! - `validate` — parse every rule document and resolve every reference,
//!   reporting *all* problems, not just the first.
//! - `plan` — lock, read live state, diff, unlock. The plan records the
//!   serial it was computed against.
//! - `apply` — lock, re-read, reject stale or tampered plans, execute the
//!   actions in order, write serial + 1, append to the history log, unlock.
//!
//! Applying the same desired state twice converges after the first apply:
//! the second plan is empty and applying it writes nothing.

pub mod config;
pub mod declaration;
pub mod error;
pub mod reconciler;

pub use config::EngineConfig;
pub use declaration::{Declaration, ValidationIssue, ValidationReport};
pub use error::EngineError;
pub use reconciler::Reconciler;
