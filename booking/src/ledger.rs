//! Seat ledger.
//!
//! `available_seats` is the only hot counter in the service. It moves only
//! through [`reserve`] (ticket confirmed) and [`release`] (ticket
//! cancelled), both called while the fleet state is write-locked, so two
//! confirmations on the same bus can never both pass the check.

use crate::error::{BookingError, BookingResult};
use crate::types::Bus;

/// Fail with `InsufficientSeats` unless `seats` are free.
///
/// # Errors
///
/// [`BookingError::InsufficientSeats`] when `seats > available_seats`.
pub fn ensure_available(bus: &Bus, seats: u32) -> BookingResult<()> {
    if seats > bus.available_seats {
        return Err(BookingError::InsufficientSeats {
            requested: seats,
            available: bus.available_seats,
        });
    }
    Ok(())
}

/// Debit `seats` from the bus.
///
/// # Errors
///
/// [`BookingError::InsufficientSeats`] when the bus cannot cover the debit;
/// the counter is left untouched.
pub fn reserve(bus: &mut Bus, seats: u32) -> BookingResult<()> {
    ensure_available(bus, seats)?;
    bus.available_seats -= seats;
    Ok(())
}

/// Credit `seats` back, never above capacity.
///
/// Returns the seats actually credited.
pub fn release(bus: &mut Bus, seats: u32) -> u32 {
    let headroom = bus.seat_capacity.saturating_sub(bus.available_seats);
    let credited = seats.min(headroom);

    if credited < seats {
        tracing::warn!(
            bus_id = %bus.id,
            requested = seats,
            credited,
            "Seat release clamped at capacity"
        );
    }

    bus.available_seats += credited;
    credited
}
