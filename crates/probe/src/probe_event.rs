//! The view of a kernel event that custom event factories need.

use chrono::{DateTime, Utc};

use secprobe_core::EventType;

/// A decoded kernel event, as seen by the custom event factories.
///
/// Implemented by the probe's event model; decoding and field resolution
/// happen there.
pub trait ProbeEvent: Send + Sync {
    fn event_type(&self) -> EventType;

    /// Wall-clock time the event occurred, converted from the kernel timestamp.
    fn resolve_event_timestamp(&self) -> DateTime<Utc>;

    /// Serializable snapshot of the event and its resolved context.
    fn snapshot(&self) -> serde_json::Value;
}
