//! Path-resolution errors and their mapping to custom event types.
//!
//! Resolvers rebuild file paths from kernel-provided mount and inode
//! identifiers. Some failures are suspicious enough to report on their own
//! (an abnormal path); [`classify`] decides which event type such a report
//! carries.

use std::error::Error as StdError;

use secprobe_core::EventType;

/// Failure while reconstructing a filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum PathResolutionError {
    /// The in-process dentry walk hit its depth limit before reaching the root.
    #[error("truncated parents")]
    TruncatedParents,

    /// The kernel-side (eRPC) dentry walk hit its depth limit.
    #[error("truncated parents (eRPC)")]
    TruncatedParentsErpc,

    #[error("dentry key not found: mount_id {mount_id}, inode {inode}")]
    DentryKeyNotFound { mount_id: u32, inode: u64 },

    #[error("eRPC request not processed")]
    ErpcRequestNotProcessed,

    #[error("eRPC resolution failed: {0}")]
    ErpcResolution(String),

    #[error("invalid mount id {0}")]
    InvalidMountId(u32),
}

impl PathResolutionError {
    /// Stable identifier of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            PathResolutionError::TruncatedParents => "truncated_parents",
            PathResolutionError::TruncatedParentsErpc => "truncated_parents_erpc",
            PathResolutionError::DentryKeyNotFound { .. } => "dentry_key_not_found",
            PathResolutionError::ErpcRequestNotProcessed => "erpc_request_not_processed",
            PathResolutionError::ErpcResolution(_) => "erpc_resolution",
            PathResolutionError::InvalidMountId(_) => "invalid_mount_id",
        }
    }
}

/// Error kinds that get a dedicated event type. Anything absent from this
/// table is reported as [`EventType::Unknown`].
const RESOLUTION_EVENT_TYPES: &[(&str, EventType)] = &[
    ("truncated_parents", EventType::TruncatedParents),
    ("truncated_parents_erpc", EventType::TruncatedParents),
];

/// Map a resolution error to the event type used to report it.
///
/// Foreign error types and variants missing from the table map to
/// [`EventType::Unknown`].
pub fn classify(err: &(dyn StdError + 'static)) -> EventType {
    err.downcast_ref::<PathResolutionError>()
        .and_then(|e| {
            RESOLUTION_EVENT_TYPES
                .iter()
                .find(|(kind, _)| *kind == e.kind())
                .map(|(_, event_type)| *event_type)
        })
        .unwrap_or(EventType::Unknown)
}
