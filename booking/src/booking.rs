//! Booking state machine.
//!
//! ```text
//! pending ──accept──> accepted ──cancel──> cancelled
//!    ├──reject──> rejected
//!    └──cancel──> cancelled
//! ```
//!
//! Each function checks everything against the current state and returns
//! the events to commit. Nothing is mutated here.

use crate::error::{BookingError, BookingResult};
use crate::fleet::{Decision, FleetEvent, FleetState, Subject};
use crate::policy;
use crate::types::{BookingId, BookingStatus, BusId, Principal, TicketStatus};
use chrono::{DateTime, Utc};

/// Longest accepted reason text.
pub const MAX_REASON_LEN: usize = 500;

/// Trim a free-text reason; blank becomes `None`.
///
/// # Errors
///
/// `Validation` if the reason is longer than [`MAX_REASON_LEN`].
pub fn normalize_reason(reason: Option<String>) -> BookingResult<Option<String>> {
    let reason = reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    if let Some(reason) = &reason {
        if reason.chars().count() > MAX_REASON_LEN {
            return Err(BookingError::Validation(format!(
                "reason must be at most {MAX_REASON_LEN} characters"
            )));
        }
    }
    Ok(reason)
}

fn transition_error(from: BookingStatus, to: BookingStatus) -> BookingError {
    BookingError::InvalidTransition(format!("Booking is already {from}, cannot become {to}"))
}

/// A passenger requests a seat on a bus.
///
/// # Errors
///
/// `Forbidden`, `NotFound`, `BusInactive`, `DuplicateBooking`.
pub fn create(
    state: &FleetState,
    principal: &Principal,
    bus_id: BusId,
    now: DateTime<Utc>,
) -> BookingResult<Decision> {
    policy::can_create_booking(principal)?;
    let bus = state.bus(bus_id)?;

    if !bus.active {
        return Err(BookingError::BusInactive);
    }
    if state.open_booking(principal.user_id, bus_id).is_some() {
        return Err(BookingError::DuplicateBooking);
    }

    let booking_id = BookingId::new();
    Ok(Decision::new(
        Subject::Booking(booking_id),
        vec![FleetEvent::BookingRequested {
            booking_id,
            passenger: principal.user_id,
            bus_id,
            at: now,
        }],
    ))
}

/// The bus's supervisor accepts a pending request.
///
/// Acceptance only checks that a seat is free; seats are debited when the
/// ticket is confirmed, so more bookings than seats may be accepted.
///
/// # Errors
///
/// `NotFound`, `Forbidden`, `InvalidTransition`, `NoSeatsAvailable`.
pub fn accept(
    state: &FleetState,
    principal: &Principal,
    booking_id: BookingId,
    now: DateTime<Utc>,
) -> BookingResult<Decision> {
    let booking = state.booking(booking_id)?;
    let bus = state.bus(booking.bus_id)?;
    policy::can_decide_booking(principal, bus)?;

    if booking.status != BookingStatus::Pending {
        return Err(transition_error(booking.status, BookingStatus::Accepted));
    }
    if bus.available_seats == 0 {
        return Err(BookingError::NoSeatsAvailable);
    }

    Ok(Decision::new(
        Subject::Booking(booking_id),
        vec![FleetEvent::BookingAccepted {
            booking_id,
            at: now,
        }],
    ))
}

/// The bus's supervisor rejects a pending request.
///
/// # Errors
///
/// `Validation`, `NotFound`, `Forbidden`, `InvalidTransition`.
pub fn reject(
    state: &FleetState,
    principal: &Principal,
    booking_id: BookingId,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> BookingResult<Decision> {
    let reason = normalize_reason(reason)?;
    let booking = state.booking(booking_id)?;
    let bus = state.bus(booking.bus_id)?;
    policy::can_decide_booking(principal, bus)?;

    if booking.status != BookingStatus::Pending {
        return Err(transition_error(booking.status, BookingStatus::Rejected));
    }

    Ok(Decision::new(
        Subject::Booking(booking_id),
        vec![FleetEvent::BookingRejected {
            booking_id,
            reason,
            at: now,
        }],
    ))
}

/// The passenger or the bus's supervisor withdraws a booking.
///
/// A confirmed ticket is cancelled first and its seats go back to the bus.
/// A booking whose trip is already completed stays as it is.
///
/// # Errors
///
/// `Validation`, `NotFound`, `Forbidden`, `InvalidTransition`.
pub fn cancel(
    state: &FleetState,
    principal: &Principal,
    booking_id: BookingId,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> BookingResult<Decision> {
    let reason = normalize_reason(reason)?;
    let booking = state.booking(booking_id)?;
    let bus = state.bus(booking.bus_id)?;
    policy::can_cancel_booking(principal, booking, bus)?;

    if !booking.status.can_transition_to(BookingStatus::Cancelled) {
        return Err(transition_error(booking.status, BookingStatus::Cancelled));
    }

    let mut events = Vec::with_capacity(2);
    if let Some(ticket) = state.ticket_for_booking(booking_id) {
        match ticket.status {
            TicketStatus::Confirmed => events.push(FleetEvent::TicketCancelled {
                ticket_id: ticket.id,
                bus_id: bus.id,
                seats: ticket.seats_booked,
                at: now,
            }),
            TicketStatus::Completed => {
                return Err(BookingError::InvalidTransition(
                    "Trip is already completed".to_string(),
                ));
            },
            TicketStatus::Cancelled => {},
        }
    }
    events.push(FleetEvent::BookingCancelled {
        booking_id,
        reason,
        at: now,
    });

    Ok(Decision::new(Subject::Booking(booking_id), events))
}
