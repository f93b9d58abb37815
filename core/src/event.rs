//! Journal events.
//!
//! Every committed state change in the booking service is recorded as an
//! event. Events are facts: they are never edited, and replaying them in
//! version order rebuilds the fleet state exactly.
//!
//! Payloads are encoded with `bincode`. Only the event type name and the
//! optional metadata are kept human-readable in the journal.
//!
//! # Example
//!
//! ```
//! use busline_core::event::Event;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! enum SeatEvent {
//!     Reserved { bus: String, seats: u32 },
//!     Released { bus: String, seats: u32 },
//! }
//!
//! impl Event for SeatEvent {
//!     fn event_type(&self) -> &'static str {
//!         match self {
//!             SeatEvent::Reserved { .. } => "SeatReserved.v1",
//!             SeatEvent::Released { .. } => "SeatReleased.v1",
//!         }
//!     }
//! }
//! ```

use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error;

/// Error types for event encoding.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize event to bytes.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// Failed to deserialize event from bytes.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(String),
}

/// An event that can be journaled and replayed.
///
/// `event_type()` returns a stable identifier with a schema version suffix
/// (`"BookingAccepted.v1"`). The identifier is stored next to the payload
/// so that operators can read the journal without decoding it.
pub trait Event: Send + Sync + 'static {
    /// Stable, versioned type name of this event.
    fn event_type(&self) -> &'static str;

    /// Encode this event as bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::SerializationError`] if the payload cannot be
    /// encoded.
    fn to_bytes(&self) -> Result<Vec<u8>, EventError>
    where
        Self: Serialize,
    {
        bincode::serialize(self).map_err(|e| EventError::SerializationError(e.to_string()))
    }

    /// Decode an event from bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::DeserializationError`] if the bytes are corrupted
    /// or were written by an incompatible schema.
    fn from_bytes(bytes: &[u8]) -> Result<Self, EventError>
    where
        Self: DeserializeOwned + Sized,
    {
        bincode::deserialize(bytes).map_err(|e| EventError::DeserializationError(e.to_string()))
    }
}

/// A serialized event as it travels to and from the journal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerializedEvent {
    /// The event type identifier (e.g. `"TicketConfirmed.v1"`).
    pub event_type: String,

    /// The bincode-encoded payload.
    pub data: Vec<u8>,

    /// Optional JSON metadata (`correlation_id`, `user_id`).
    pub metadata: Option<serde_json::Value>,
}

impl SerializedEvent {
    /// Create a new serialized event.
    #[must_use]
    pub const fn new(
        event_type: String,
        data: Vec<u8>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event_type,
            data,
            metadata,
        }
    }

    /// Encode a typed event.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::SerializationError`] if the event cannot be encoded.
    pub fn from_event<E: Event + Serialize>(
        event: &E,
        metadata: Option<serde_json::Value>,
    ) -> Result<Self, EventError> {
        Ok(Self {
            event_type: event.event_type().to_string(),
            data: event.to_bytes()?,
            metadata,
        })
    }

    /// Decode the payload back into a typed event.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::DeserializationError`] if the payload does not
    /// decode as `E`.
    pub fn decode<E: Event + DeserializeOwned>(&self) -> Result<E, EventError> {
        E::from_bytes(&self.data)
    }
}

impl fmt::Display for SerializedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SerializedEvent {{ type: {}, size: {} bytes }}",
            self.event_type,
            self.data.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
    enum SeatEvent {
        Reserved { bus: String, seats: u32 },
        Released { bus: String, seats: u32 },
    }

    impl Event for SeatEvent {
        fn event_type(&self) -> &'static str {
            match self {
                SeatEvent::Reserved { .. } => "SeatReserved.v1",
                SeatEvent::Released { .. } => "SeatReleased.v1",
            }
        }
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn serialized_event_keeps_type_and_metadata() {
        let event = SeatEvent::Released {
            bus: "bus-7".to_string(),
            seats: 2,
        };
        let metadata = serde_json::json!({ "correlation_id": "c-1" });

        let serialized = SerializedEvent::from_event(&event, Some(metadata.clone()))
            .expect("serialization should succeed");

        assert_eq!(serialized.event_type, "SeatReleased.v1");
        assert_eq!(serialized.metadata, Some(metadata));
        let decoded: SeatEvent = serialized.decode().expect("decode should succeed");
        assert_eq!(decoded, event);
    }

    #[test]
    fn decode_rejects_foreign_payload() {
        let serialized = SerializedEvent::new("SeatReserved.v1".to_string(), vec![0xff], None);
        assert!(serialized.decode::<SeatEvent>().is_err());
    }

    #[test]
    fn display_reports_size() {
        let serialized = SerializedEvent::new("SeatReserved.v1".to_string(), vec![1, 2, 3], None);
        let display = format!("{serialized}");
        assert!(display.contains("SeatReserved.v1"));
        assert!(display.contains("3 bytes"));
    }
}
