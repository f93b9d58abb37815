//! The fleet aggregate.
//!
//! Transition functions in [`crate::booking`], [`crate::ticket`] and
//! [`crate::bus`] decide which [`FleetEvent`]s a command produces. The
//! [`FleetReducer`] journals them, then applies them to [`FleetState`] and
//! notifies live observers, one command at a time.

pub mod actions;
pub mod events;
pub mod reducer;
pub mod state;
pub mod views;

pub use actions::{Command, FleetAction, Outcome};
pub use events::FleetEvent;
pub use reducer::{FleetEnvironment, FleetReducer, FleetStore};
pub use state::FleetState;

use crate::types::{BoardingPointId, BookingId, BusId, TicketId};

/// The entity a command was about; its new state is the command's outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subject {
    /// A bus
    Bus(BusId),
    /// A boarding point
    BoardingPoint(BoardingPointId),
    /// A booking
    Booking(BookingId),
    /// A ticket
    Ticket(TicketId),
}

/// What an allowed command changes.
#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    /// Entity reported back to the caller
    pub subject: Subject,
    /// Events to commit, in order
    pub events: Vec<FleetEvent>,
}

impl Decision {
    /// New decision
    #[must_use]
    pub const fn new(subject: Subject, events: Vec<FleetEvent>) -> Self {
        Self { subject, events }
    }
}
