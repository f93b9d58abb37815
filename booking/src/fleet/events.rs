//! Journal events of the fleet.
//!
//! One event per committed fact. [`FleetState::apply`](super::FleetState::apply)
//! is the only place that turns them into state, both live and on replay.
//!
//! Position samples are the exception to "journal everything": each one
//! supersedes the last, so they only update the in-memory bus row.

use crate::types::{
    BoardingPoint, BookingId, Bus, BusId, Location, Ticket, TicketId, UserId,
};
use busline_core::event::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything that can happen to the fleet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FleetEvent {
    /// An owner added a bus; all seats start free
    BusRegistered {
        /// The new bus
        bus: Bus,
    },
    /// The bus's supervisor changed
    SupervisorAssigned {
        /// Bus
        bus_id: BusId,
        /// New supervisor, `None` to unassign
        supervisor: Option<UserId>,
    },
    /// The bus was opened or closed for new bookings
    BusActivityChanged {
        /// Bus
        bus_id: BusId,
        /// New flag
        active: bool,
    },
    /// A pickup location was added to a route
    BoardingPointAdded {
        /// The new boarding point
        point: BoardingPoint,
    },
    /// A passenger asked for a seat
    BookingRequested {
        /// New booking
        booking_id: BookingId,
        /// Requesting passenger
        passenger: UserId,
        /// Requested bus
        bus_id: BusId,
        /// When
        at: DateTime<Utc>,
    },
    /// The supervisor accepted the request
    BookingAccepted {
        /// Booking
        booking_id: BookingId,
        /// When
        at: DateTime<Utc>,
    },
    /// The supervisor rejected the request
    BookingRejected {
        /// Booking
        booking_id: BookingId,
        /// Optional reason
        reason: Option<String>,
        /// When
        at: DateTime<Utc>,
    },
    /// The booking was withdrawn
    BookingCancelled {
        /// Booking
        booking_id: BookingId,
        /// Optional reason
        reason: Option<String>,
        /// When
        at: DateTime<Utc>,
    },
    /// A ticket was issued and its seats debited
    TicketConfirmed {
        /// Bus whose ledger is debited
        bus_id: BusId,
        /// The new ticket
        ticket: Ticket,
    },
    /// A ticket was cancelled and its seats credited back
    TicketCancelled {
        /// Ticket
        ticket_id: TicketId,
        /// Bus whose ledger is credited
        bus_id: BusId,
        /// Seats credited
        seats: u32,
        /// When
        at: DateTime<Utc>,
    },
    /// The trip was completed
    TicketCompleted {
        /// Ticket
        ticket_id: TicketId,
        /// When
        at: DateTime<Utc>,
    },
    /// The bus reported its position
    LocationRecorded {
        /// Bus
        bus_id: BusId,
        /// The sample
        location: Location,
    },
}

impl FleetEvent {
    /// Whether the event is written to the journal.
    #[must_use]
    pub const fn is_durable(&self) -> bool {
        !matches!(self, Self::LocationRecorded { .. })
    }
}

impl Event for FleetEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::BusRegistered { .. } => "BusRegistered.v1",
            Self::SupervisorAssigned { .. } => "SupervisorAssigned.v1",
            Self::BusActivityChanged { .. } => "BusActivityChanged.v1",
            Self::BoardingPointAdded { .. } => "BoardingPointAdded.v1",
            Self::BookingRequested { .. } => "BookingRequested.v1",
            Self::BookingAccepted { .. } => "BookingAccepted.v1",
            Self::BookingRejected { .. } => "BookingRejected.v1",
            Self::BookingCancelled { .. } => "BookingCancelled.v1",
            Self::TicketConfirmed { .. } => "TicketConfirmed.v1",
            Self::TicketCancelled { .. } => "TicketCancelled.v1",
            Self::TicketCompleted { .. } => "TicketCompleted.v1",
            Self::LocationRecorded { .. } => "LocationRecorded.v1",
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::fixtures;
    use busline_core::event::SerializedEvent;

    #[test]
    fn bincode_payload_decodes_back() {
        let bus = fixtures::bus(fixtures::owner(), None);
        let event = FleetEvent::BusRegistered { bus };

        let serialized = SerializedEvent::from_event(&event, None).expect("encode");
        assert_eq!(serialized.event_type, "BusRegistered.v1");

        let decoded: FleetEvent = serialized.decode().expect("decode");
        assert_eq!(decoded, event);
    }
}
