//! Error types and load result structures for the policy loader.

use std::path::PathBuf;

use secprobe_core::EventType;

/// Errors that can occur while reading policy files.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse/deserialization error.
    #[error("YAML parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Result alias for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Structural problems found in a single rule entry.
///
/// These become the cause of a [`RuleLoadError`](crate::RuleLoadError).
#[derive(Debug, thiserror::Error)]
pub enum RuleCheckError {
    #[error("rule id must not be empty")]
    EmptyId,

    #[error("rule expression must not be empty")]
    EmptyExpression,

    #[error("expression does not start with an event field: {0}")]
    MissingEventType(String),

    #[error("unknown event type `{0}`")]
    UnknownEventType(String),

    #[error("event type `{0}` is not enabled")]
    EventTypeDisabled(EventType),

    #[error("rule id already defined in policy `{policy}`")]
    DuplicateId { policy: String },
}

/// Outcome of loading a single policy file.
#[derive(Debug)]
pub struct LoadResult {
    /// Path to the file that was loaded.
    pub path: PathBuf,
    /// Status of the load attempt.
    pub status: LoadStatus,
}

/// Status of a single file load attempt.
#[derive(Debug)]
pub enum LoadStatus {
    /// Policy was parsed. `rejected` rules are reported through the load errors.
    Loaded {
        policy: String,
        rules: usize,
        rejected: usize,
    },
    /// File was skipped (dotfile, wrong extension).
    Skipped { reason: String },
    /// Read or parse error occurred.
    Failed { error: String },
}
