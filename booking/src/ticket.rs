//! Ticket state machine: `confirmed -> {completed, cancelled}`.
//!
//! Confirming a ticket debits the seat ledger; cancelling it credits the
//! seats back and cancels the parent booking in the same commit.

use crate::error::{BookingError, BookingResult};
use crate::fleet::{Decision, FleetEvent, FleetState, Subject};
use crate::ledger;
use crate::policy;
use crate::types::{
    BoardingPointId, BookingId, BookingStatus, Principal, Ticket, TicketId, TicketStatus,
};
use chrono::{DateTime, Utc};
use std::ops::RangeInclusive;

/// Seats a single ticket may hold.
pub const SEATS_PER_TICKET: RangeInclusive<u32> = 1..=10;

/// Issue the ticket for an accepted booking.
///
/// # Errors
///
/// `Validation`, `NotFound`, `Forbidden`, `BookingNotAccepted`,
/// `DuplicateTicket`, `InvalidBoardingPoint`, `InsufficientSeats`.
pub fn confirm(
    state: &FleetState,
    principal: &Principal,
    booking_id: BookingId,
    boarding_point_id: BoardingPointId,
    seats: u32,
    now: DateTime<Utc>,
) -> BookingResult<Decision> {
    if !SEATS_PER_TICKET.contains(&seats) {
        return Err(BookingError::Validation(format!(
            "seats must be between {} and {}",
            SEATS_PER_TICKET.start(),
            SEATS_PER_TICKET.end()
        )));
    }

    let booking = state.booking(booking_id)?;
    policy::can_confirm_ticket(principal, booking)?;

    if booking.status != BookingStatus::Accepted {
        return Err(BookingError::BookingNotAccepted(booking.status.to_string()));
    }
    if state.ticket_for_booking(booking_id).is_some() {
        return Err(BookingError::DuplicateTicket);
    }

    let bus = state.bus(booking.bus_id)?;
    let on_route = state
        .boarding_points
        .get(&boarding_point_id)
        .is_some_and(|point| point.bus_id == bus.id);
    if !on_route {
        return Err(BookingError::InvalidBoardingPoint);
    }

    ledger::ensure_available(bus, seats)?;

    let total_fare = bus
        .fare
        .times(seats)
        .ok_or_else(|| BookingError::Validation("total fare out of range".to_string()))?;

    let ticket = Ticket {
        id: TicketId::new(),
        booking_id,
        boarding_point_id,
        seats_booked: seats,
        fare_per_seat: bus.fare,
        total_fare,
        status: TicketStatus::Confirmed,
        created_at: now,
        completed_at: None,
        cancelled_at: None,
    };

    Ok(Decision::new(
        Subject::Ticket(ticket.id),
        vec![FleetEvent::TicketConfirmed {
            bus_id: bus.id,
            ticket,
        }],
    ))
}

/// The passenger gives the ticket back.
///
/// A second cancel is an `InvalidTransition` and credits nothing.
///
/// # Errors
///
/// `Validation`, `NotFound`, `Forbidden`, `InvalidTransition`.
pub fn cancel(
    state: &FleetState,
    principal: &Principal,
    ticket_id: TicketId,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> BookingResult<Decision> {
    let reason = crate::booking::normalize_reason(reason)?;
    let ticket = state.ticket(ticket_id)?;
    let booking = state.booking(ticket.booking_id)?;
    policy::can_cancel_ticket(principal, booking)?;

    if ticket.status != TicketStatus::Confirmed {
        return Err(BookingError::InvalidTransition(format!(
            "Ticket is already {}",
            ticket.status
        )));
    }

    let mut events = vec![FleetEvent::TicketCancelled {
        ticket_id,
        bus_id: booking.bus_id,
        seats: ticket.seats_booked,
        at: now,
    }];
    if booking.status.can_transition_to(BookingStatus::Cancelled) {
        events.push(FleetEvent::BookingCancelled {
            booking_id: booking.id,
            reason,
            at: now,
        });
    }

    Ok(Decision::new(Subject::Ticket(ticket_id), events))
}

/// The bus's supervisor marks the trip done. Seats stay debited.
///
/// # Errors
///
/// `NotFound`, `Forbidden`, `InvalidTransition`.
pub fn complete(
    state: &FleetState,
    principal: &Principal,
    ticket_id: TicketId,
    now: DateTime<Utc>,
) -> BookingResult<Decision> {
    let ticket = state.ticket(ticket_id)?;
    let booking = state.booking(ticket.booking_id)?;
    let bus = state.bus(booking.bus_id)?;
    policy::can_complete_ticket(principal, bus)?;

    if ticket.status != TicketStatus::Confirmed {
        return Err(BookingError::InvalidTransition(format!(
            "Ticket is already {}",
            ticket.status
        )));
    }

    Ok(Decision::new(
        Subject::Ticket(ticket_id),
        vec![FleetEvent::TicketCompleted { ticket_id, at: now }],
    ))
}
