//! Access policy gate.
//!
//! Pure predicates: each takes the caller and the ownership fields of the
//! resource and answers `Ok(())` or the [`Denial`] reason. They run before
//! any state changes; the transition code never re-derives authorization.
//!
//! Checks are ordered: inactive account, then role, then ownership.

use crate::types::{Booking, Bus, Denial, Principal, Role};

/// Result of a policy check.
pub type Decision = Result<(), Denial>;

const fn active(principal: &Principal) -> Decision {
    if principal.active {
        Ok(())
    } else {
        Err(Denial::AccountInactive)
    }
}

fn role(principal: &Principal, expected: Role) -> Decision {
    active(principal)?;
    if principal.role == expected {
        Ok(())
    } else {
        Err(Denial::WrongRole)
    }
}

fn assigned_supervisor(principal: &Principal, bus: &Bus) -> Decision {
    role(principal, Role::Supervisor)?;
    if bus.supervisor == Some(principal.user_id) {
        Ok(())
    } else {
        Err(Denial::NotAssignedSupervisor)
    }
}

fn booking_owner(principal: &Principal, booking: &Booking) -> Decision {
    role(principal, Role::Passenger)?;
    if booking.passenger == principal.user_id {
        Ok(())
    } else {
        Err(Denial::NotOwner)
    }
}

/// Passengers request seats.
pub fn can_create_booking(principal: &Principal) -> Decision {
    role(principal, Role::Passenger)
}

/// Only the supervisor assigned to the bus accepts or rejects.
pub fn can_decide_booking(principal: &Principal, bus: &Bus) -> Decision {
    assigned_supervisor(principal, bus)
}

/// The booking's passenger or the bus's supervisor may cancel.
pub fn can_cancel_booking(principal: &Principal, booking: &Booking, bus: &Bus) -> Decision {
    active(principal)?;
    match principal.role {
        Role::Passenger => booking_owner(principal, booking),
        Role::Supervisor => assigned_supervisor(principal, bus),
        Role::Owner => Err(Denial::WrongRole),
    }
}

/// The booking's passenger confirms the ticket.
pub fn can_confirm_ticket(principal: &Principal, booking: &Booking) -> Decision {
    booking_owner(principal, booking)
}

/// The ticket's passenger cancels it.
pub fn can_cancel_ticket(principal: &Principal, booking: &Booking) -> Decision {
    booking_owner(principal, booking)
}

/// The bus's supervisor marks a trip done.
pub fn can_complete_ticket(principal: &Principal, bus: &Bus) -> Decision {
    assigned_supervisor(principal, bus)
}

/// The bus's supervisor reports its position.
pub fn can_update_location(principal: &Principal, bus: &Bus) -> Decision {
    assigned_supervisor(principal, bus)
}

/// Supervisors list pending requests, only for their own bus when one is named.
pub fn can_list_pending(principal: &Principal, bus: Option<&Bus>) -> Decision {
    match bus {
        Some(bus) => assigned_supervisor(principal, bus),
        None => role(principal, Role::Supervisor),
    }
}

/// Passengers list their own bookings and tickets.
pub fn can_list_own(principal: &Principal) -> Decision {
    role(principal, Role::Passenger)
}

/// The passenger, the bus's supervisor or its owner may view a booking.
pub fn can_view_booking(principal: &Principal, booking: &Booking, bus: &Bus) -> Decision {
    active(principal)?;
    let allowed = match principal.role {
        Role::Passenger => booking.passenger == principal.user_id,
        Role::Supervisor => bus.supervisor == Some(principal.user_id),
        Role::Owner => bus.owner == principal.user_id,
    };
    if allowed {
        Ok(())
    } else {
        Err(Denial::NotOwner)
    }
}

/// Who may watch a bus's position.
///
/// A passenger needs an accepted booking on the bus; the supervisor must be
/// assigned to it; the owner must own it.
pub fn can_observe_bus(principal: &Principal, bus: &Bus, has_accepted_booking: bool) -> Decision {
    active(principal)?;
    match principal.role {
        Role::Passenger if has_accepted_booking => Ok(()),
        Role::Passenger => Err(Denial::NotOwner),
        Role::Supervisor => assigned_supervisor(principal, bus),
        Role::Owner => owns_bus(principal, bus),
    }
}

/// Owners register buses.
pub fn can_register_bus(principal: &Principal) -> Decision {
    role(principal, Role::Owner)
}

/// Fleet changes need the owner of the bus.
pub fn can_manage_bus(principal: &Principal, bus: &Bus) -> Decision {
    role(principal, Role::Owner)?;
    owns_bus(principal, bus)
}

fn owns_bus(principal: &Principal, bus: &Bus) -> Decision {
    if bus.owner == principal.user_id {
        Ok(())
    } else {
        Err(Denial::NotOwner)
    }
}
