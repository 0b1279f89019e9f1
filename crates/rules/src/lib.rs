//! Rule-engine data shapes consumed by the custom event layer.
//!
//! This crate provides:
//! - Policy and rule definition types, with each definition carrying a
//!   back-reference to the policy it was declared in
//! - The `Rule` routing handle shared by detections and meta-events
//! - Structured rule-load errors and the aggregate collected during a load pass
//! - A filesystem policy loader that parses YAML policies and performs
//!   structural checks (expressions are never compiled here)

pub mod definition;
pub mod error;
pub mod loader;
pub mod ruleset;

pub use definition::{Policy, PolicyRef, RuleDefinition};
pub use error::{LoadErrors, RuleLoadError, RuleLoadErrorKind};
pub use loader::{LoadOutcome, LoadResult, LoadStatus, PolicyLoader};
pub use ruleset::{Rule, RuleSet};
