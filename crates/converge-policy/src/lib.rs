//! # converge-policy
//!
//! Policy rule documents and enforcement evaluation for Converge.
//!
//! A [`PolicyRule`] is a condition/effect pair evaluated against resource
//! properties at creation time. Rules are wrapped in a [`PolicyDefinition`]
//! (which registers them under a name) and activated by a
//! [`PolicyAssignment`] (which binds a definition to a [`Scope`]). The
//! [`EnforcementEngine`] evaluates resource requests against every
//! assignment whose scope contains the request.
//!
//! ## Key invariants
//!
//! - **One condition, one effect**: a rule document carries exactly one
//!   condition and one effect; anything else is a parse error.
//! - **Scope is blast radius**: an assignment only fires on requests inside
//!   its scope. A subscription assignment covers every resource group under
//!   that subscription.
//! - **First deny wins**: a matching `deny` rule short-circuits evaluation;
//!   `audit` matches are recorded but never block.

pub mod assignment;
pub mod definition;
pub mod engine;
pub mod error;
pub mod rule;
pub mod scope;

pub use assignment::PolicyAssignment;
pub use definition::{PolicyDefinition, PolicyMode, PolicyType};
pub use engine::{EnforcementDecision, EnforcementEngine, ResourceRequest};
pub use error::PolicyError;
pub use rule::{Condition, PolicyEffect, PolicyRule, ThenClause};
pub use scope::Scope;
