//! # converge-pipeline
//!
//! The two-phase delivery gate for Converge.
//!
//! A [`PipelineRun`] is an explicit finite state machine: a pull-request
//! event may only enter the validate path, a push to the main branch may
//! only enter the apply path, and there is **no** transition from
//! `Validated` to `Applying` — the merge itself is the trigger for the
//! apply path, never the pipeline.
//!
//! Steps run strictly in sequence (`init → validate → plan [→ apply]`);
//! the first failure halts the run at that step with the reason preserved
//! verbatim. There is no retry, no rollback, and no partial-success state.
//!
//! A [`PipelineManifest`] (YAML) declares branch filters and the secrets a
//! run must carry; a run refuses to start when a required secret is
//! absent.

pub mod error;
pub mod manifest;
pub mod run;

pub use error::PipelineError;
pub use manifest::{BranchRule, PipelineManifest, TriggerRules};
pub use run::{PipelineRun, PipelineState, StepKind, StepOutcome, StepResult, TriggerEvent};
