//! Actions processed by the fleet store.

use crate::bus::{NewBoardingPoint, NewBus};
use crate::error::BookingError;
use crate::types::{
    BoardingPoint, BoardingPointId, Booking, BookingId, Bus, BusId, Principal, Ticket, TicketId,
    UserId,
};
use uuid::Uuid;

/// A state-changing request.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Passenger asks for a seat
    CreateBooking {
        /// Requested bus
        bus_id: BusId,
    },
    /// Supervisor accepts a pending booking
    AcceptBooking {
        /// Booking
        booking_id: BookingId,
    },
    /// Supervisor rejects a pending booking
    RejectBooking {
        /// Booking
        booking_id: BookingId,
        /// Optional reason
        reason: Option<String>,
    },
    /// Passenger or supervisor withdraws a booking
    CancelBooking {
        /// Booking
        booking_id: BookingId,
        /// Optional reason
        reason: Option<String>,
    },
    /// Passenger takes seats on an accepted booking
    ConfirmTicket {
        /// Accepted booking
        booking_id: BookingId,
        /// Pickup location
        boarding_point_id: BoardingPointId,
        /// Seats wanted
        seats: u32,
    },
    /// Passenger gives a ticket back
    CancelTicket {
        /// Ticket
        ticket_id: TicketId,
        /// Optional reason
        reason: Option<String>,
    },
    /// Supervisor marks a trip done
    CompleteTicket {
        /// Ticket
        ticket_id: TicketId,
    },
    /// Supervisor reports the bus's position
    UpdateLocation {
        /// Bus
        bus_id: BusId,
        /// Latitude
        lat: f64,
        /// Longitude
        lng: f64,
    },
    /// Owner adds a bus
    RegisterBus(NewBus),
    /// Owner assigns or removes the supervisor
    AssignSupervisor {
        /// Bus
        bus_id: BusId,
        /// New supervisor
        supervisor: Option<UserId>,
    },
    /// Owner opens or closes the bus
    SetBusActive {
        /// Bus
        bus_id: BusId,
        /// New flag
        active: bool,
    },
    /// Owner adds a pickup location
    AddBoardingPoint {
        /// Bus
        bus_id: BusId,
        /// The location
        point: NewBoardingPoint,
    },
}

impl Command {
    /// Short name for logs and metrics
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateBooking { .. } => "create_booking",
            Self::AcceptBooking { .. } => "accept_booking",
            Self::RejectBooking { .. } => "reject_booking",
            Self::CancelBooking { .. } => "cancel_booking",
            Self::ConfirmTicket { .. } => "confirm_ticket",
            Self::CancelTicket { .. } => "cancel_ticket",
            Self::CompleteTicket { .. } => "complete_ticket",
            Self::UpdateLocation { .. } => "update_location",
            Self::RegisterBus(_) => "register_bus",
            Self::AssignSupervisor { .. } => "assign_supervisor",
            Self::SetBusActive { .. } => "set_bus_active",
            Self::AddBoardingPoint { .. } => "add_boarding_point",
        }
    }
}

/// New state of the entity a command touched.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// A bus
    Bus(Bus),
    /// A boarding point
    BoardingPoint(BoardingPoint),
    /// A booking
    Booking(Booking),
    /// A ticket
    Ticket(Ticket),
}

/// Fleet store actions.
///
/// Callers send `Command`. The store answers with `Completed` once the
/// events are journaled, applied and published, or with `Failed`. Both
/// carry the command's correlation ID so the caller can wait for its own
/// answer. `Journaled` is internal: the journal write for the command in
/// flight succeeded.
#[derive(Clone, Debug, PartialEq)]
pub enum FleetAction {
    /// Request from an authenticated caller
    Command {
        /// Matches the reply to the request
        correlation_id: Uuid,
        /// Who is asking
        principal: Principal,
        /// What they ask for
        command: Command,
    },
    /// The journal accepted the events of the command in flight
    Journaled {
        /// Command whose events were written
        correlation_id: Uuid,
    },
    /// The command was committed
    Completed {
        /// Request it answers
        correlation_id: Uuid,
        /// New state of the subject
        outcome: Outcome,
    },
    /// The command was refused or could not be stored
    Failed {
        /// Request it answers
        correlation_id: Uuid,
        /// Why
        error: BookingError,
    },
}

impl FleetAction {
    /// Correlation ID of a reply, `None` for commands
    #[must_use]
    pub const fn reply_to(&self) -> Option<Uuid> {
        match self {
            Self::Completed { correlation_id, .. } | Self::Failed { correlation_id, .. } => {
                Some(*correlation_id)
            },
            Self::Command { .. } | Self::Journaled { .. } => None,
        }
    }

    /// Turn a reply into the caller's result
    ///
    /// # Errors
    ///
    /// The carried error for `Failed`; `Internal` if called on a command.
    pub fn into_outcome(self) -> Result<Outcome, BookingError> {
        match self {
            Self::Completed { outcome, .. } => Ok(outcome),
            Self::Failed { error, .. } => Err(error),
            Self::Command { .. } | Self::Journaled { .. } => Err(BookingError::Internal(
                "command received where a reply was expected".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replies_expose_their_correlation_id() {
        let id = Uuid::new_v4();
        let failed = FleetAction::Failed {
            correlation_id: id,
            error: BookingError::DuplicateBooking,
        };
        assert_eq!(failed.reply_to(), Some(id));
        assert_eq!(failed.into_outcome(), Err(BookingError::DuplicateBooking));
    }
}
