//! Type-tagged envelope for custom event payloads.
//!
//! A [`CustomEvent`] pairs an [`EventType`] with any payload that can
//! serialize itself to JSON. The envelope never inspects the payload: it only
//! asks it for bytes when the event is reported.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use secprobe_core::EventType;

/// The one capability a payload needs: serialize itself to JSON bytes.
///
/// Implemented for every `Serialize` type, so payload structs only derive
/// `Serialize`.
pub trait PayloadMarshaler: fmt::Debug + Send + Sync {
    fn marshal_json(&self) -> Result<Vec<u8>, serde_json::Error>;
}

impl<T> PayloadMarshaler for T
where
    T: Serialize + fmt::Debug + Send + Sync,
{
    fn marshal_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CustomEventError {
    #[error("failed to serialize {event_type} event: {source}")]
    Serialize {
        event_type: EventType,
        #[source]
        source: serde_json::Error,
    },
}

/// Structured telemetry item describing engine health or state.
///
/// Cloning copies the stored tags and shares the payload.
#[derive(Debug, Clone)]
pub struct CustomEvent {
    event_type: EventType,
    tags: Vec<String>,
    payload: Arc<dyn PayloadMarshaler>,
}

impl CustomEvent {
    pub fn new(event_type: EventType, payload: impl PayloadMarshaler + 'static) -> Self {
        Self::from_shared(event_type, Arc::new(payload))
    }

    /// Build an event around a payload that is already shared.
    pub fn from_shared(event_type: EventType, payload: Arc<dyn PayloadMarshaler>) -> Self {
        Self {
            event_type,
            tags: Vec::new(),
            payload,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// String form of the event type, e.g. `"ruleset_loaded"`.
    pub fn type_name(&self) -> &'static str {
        self.event_type.as_str()
    }

    /// Append a tag. Stored tags can only grow.
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.tags.push(tag.into());
    }

    /// Stored tags followed by `type:<event type>`. Recomputed on each call.
    pub fn tags(&self) -> Vec<String> {
        let mut tags = Vec::with_capacity(self.tags.len() + 1);
        tags.extend(self.tags.iter().cloned());
        tags.push(format!("type:{}", self.type_name()));
        tags
    }

    /// Tags added by callers, without the synthesized type tag.
    pub fn stored_tags(&self) -> &[String] {
        &self.tags
    }

    pub fn payload(&self) -> &Arc<dyn PayloadMarshaler> {
        &self.payload
    }

    /// Serialize the payload. Fails only if the payload itself fails.
    pub fn marshal_json(&self) -> Result<Vec<u8>, CustomEventError> {
        self.payload
            .marshal_json()
            .map_err(|source| CustomEventError::Serialize {
                event_type: self.event_type,
                source,
            })
    }
}

/// Renders the payload JSON, or the serialization error message if the
/// payload cannot be serialized. Never fails.
impl fmt::Display for CustomEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.marshal_json() {
            Ok(bytes) => f.write_str(&String::from_utf8_lossy(&bytes)),
            Err(e) => write!(f, "{}", e),
        }
    }
}

/// Serializes as the payload itself, so events can be embedded in larger
/// documents by reporters.
impl Serialize for CustomEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let bytes = self.marshal_json().map_err(serde::ser::Error::custom)?;
        let value: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(serde::ser::Error::custom)?;
        value.serialize(serializer)
    }
}
