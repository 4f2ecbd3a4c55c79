//! # converge-plan
//!
//! Desired-vs-live diffing for Converge.
//!
//! [`diff`] compares a declared [`ResourceSet`] against the live one and
//! produces a [`Plan`]: an ordered list of [`PlannedAction`]s whose
//! integrity is sealed with a SHA-256 content hash. Applying the same
//! desired state twice yields an empty plan the second time — the plan is
//! the idempotence witness.
//!
//! ## Ordering invariant
//!
//! A plan never schedules an assignment before the definition it
//! references: definition creates/updates sort first, assignment deletes
//! sort before definition deletes. An assignment whose reference resolves
//! neither in the declaration nor in live state fails the diff outright.

pub mod change;
pub mod diff;
pub mod error;
pub mod plan;

pub use change::{ResourceChange, ResourceSpec};
pub use diff::{diff, DiffOptions, ResourceSet};
pub use error::PlanError;
pub use plan::{Plan, PlanSummary, PlannedAction};
