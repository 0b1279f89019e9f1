//! Filesystem policy loader.
//!
//! Reads YAML policy files from a directory tree and produces the rule set
//! together with every error raised along the way, so that one load pass can
//! be reported as a whole.

mod core;
mod error;


pub use self::core::{LoadOutcome, PolicyLoader};
pub use self::error::{LoadResult, LoadStatus, LoaderError, Result, RuleCheckError};
