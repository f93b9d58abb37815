//! Fleet state: every bus, boarding point, booking and ticket.
//!
//! Lookups return `NotFound` errors so that transition code can use `?`.

use super::events::FleetEvent;
use super::reducer::Commits;
use crate::error::{BookingError, BookingResult};
use crate::ledger;
use crate::types::{
    BoardingPoint, BoardingPointId, Booking, BookingId, BookingStatus, Bus, BusId, Ticket,
    TicketId, TicketStatus, UserId,
};
use busline_core::event::SerializedEvent;
use busline_core::event_store::EventStore;
use busline_core::stream::{StreamId, Version};
use std::collections::HashMap;

/// In-memory state of the whole fleet.
#[derive(Clone, Debug, Default)]
pub struct FleetState {
    /// Buses by ID
    pub buses: HashMap<BusId, Bus>,
    /// Boarding points by ID
    pub boarding_points: HashMap<BoardingPointId, BoardingPoint>,
    /// Bookings by ID
    pub bookings: HashMap<BookingId, Booking>,
    /// Tickets by ID
    pub tickets: HashMap<TicketId, Ticket>,
    /// Ticket of each booking (at most one)
    ticket_by_booking: HashMap<BookingId, TicketId>,
    /// Last journal slot written
    pub version: Version,
    /// Commands waiting for the journal
    pub(super) commits: Commits,
}

impl FleetState {
    /// Empty fleet
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus by ID
    ///
    /// # Errors
    ///
    /// `NotFound` if the bus is unknown.
    pub fn bus(&self, id: BusId) -> BookingResult<&Bus> {
        self.buses.get(&id).ok_or_else(|| BookingError::not_found("Bus", id))
    }

    /// Booking by ID
    ///
    /// # Errors
    ///
    /// `NotFound` if the booking is unknown.
    pub fn booking(&self, id: BookingId) -> BookingResult<&Booking> {
        self.bookings
            .get(&id)
            .ok_or_else(|| BookingError::not_found("Booking", id))
    }

    /// Ticket by ID
    ///
    /// # Errors
    ///
    /// `NotFound` if the ticket is unknown.
    pub fn ticket(&self, id: TicketId) -> BookingResult<&Ticket> {
        self.tickets
            .get(&id)
            .ok_or_else(|| BookingError::not_found("Ticket", id))
    }

    /// Boarding point by ID
    ///
    /// # Errors
    ///
    /// `NotFound` if the boarding point is unknown.
    pub fn boarding_point(&self, id: BoardingPointId) -> BookingResult<&BoardingPoint> {
        self.boarding_points
            .get(&id)
            .ok_or_else(|| BookingError::not_found("Boarding point", id))
    }

    /// The ticket issued for a booking, if any
    #[must_use]
    pub fn ticket_for_booking(&self, booking_id: BookingId) -> Option<&Ticket> {
        self.ticket_by_booking
            .get(&booking_id)
            .and_then(|id| self.tickets.get(id))
    }

    /// The passenger's pending or accepted booking on a bus
    #[must_use]
    pub fn open_booking(&self, passenger: UserId, bus_id: BusId) -> Option<&Booking> {
        self.bookings
            .values()
            .find(|b| b.passenger == passenger && b.bus_id == bus_id && b.status.is_open())
    }

    /// Whether the passenger holds an accepted booking on the bus
    #[must_use]
    pub fn has_accepted_booking(&self, passenger: UserId, bus_id: BusId) -> bool {
        self.bookings.values().any(|b| {
            b.passenger == passenger && b.bus_id == bus_id && b.status == BookingStatus::Accepted
        })
    }

    /// Boarding points of a bus in route order
    #[must_use]
    pub fn boarding_points_of(&self, bus_id: BusId) -> Vec<&BoardingPoint> {
        let mut points: Vec<_> = self
            .boarding_points
            .values()
            .filter(|p| p.bus_id == bus_id)
            .collect();
        points.sort_by_key(|p| p.sequence_order);
        points
    }

    /// Fold one event into the state.
    pub fn apply(&mut self, event: &FleetEvent) {
        match event {
            FleetEvent::BusRegistered { bus } => {
                self.buses.insert(bus.id, bus.clone());
            },
            FleetEvent::SupervisorAssigned { bus_id, supervisor } => {
                if let Some(bus) = self.buses.get_mut(bus_id) {
                    bus.supervisor = *supervisor;
                }
            },
            FleetEvent::BusActivityChanged { bus_id, active } => {
                if let Some(bus) = self.buses.get_mut(bus_id) {
                    bus.active = *active;
                }
            },
            FleetEvent::BoardingPointAdded { point } => {
                self.boarding_points.insert(point.id, point.clone());
            },
            FleetEvent::BookingRequested {
                booking_id,
                passenger,
                bus_id,
                at,
            } => {
                self.bookings.insert(
                    *booking_id,
                    Booking {
                        id: *booking_id,
                        passenger: *passenger,
                        bus_id: *bus_id,
                        status: BookingStatus::Pending,
                        request_time: *at,
                        accepted_time: None,
                        rejected_time: None,
                        cancelled_time: None,
                        rejection_reason: None,
                        cancellation_reason: None,
                    },
                );
            },
            FleetEvent::BookingAccepted { booking_id, at } => {
                if let Some(booking) = self.bookings.get_mut(booking_id) {
                    booking.status = BookingStatus::Accepted;
                    booking.accepted_time = Some(*at);
                }
            },
            FleetEvent::BookingRejected {
                booking_id,
                reason,
                at,
            } => {
                if let Some(booking) = self.bookings.get_mut(booking_id) {
                    booking.status = BookingStatus::Rejected;
                    booking.rejected_time = Some(*at);
                    booking.rejection_reason.clone_from(reason);
                }
            },
            FleetEvent::BookingCancelled {
                booking_id,
                reason,
                at,
            } => {
                if let Some(booking) = self.bookings.get_mut(booking_id) {
                    booking.status = BookingStatus::Cancelled;
                    booking.cancelled_time = Some(*at);
                    booking.cancellation_reason.clone_from(reason);
                }
            },
            FleetEvent::TicketConfirmed { bus_id, ticket } => {
                if let Some(bus) = self.buses.get_mut(bus_id) {
                    if let Err(error) = ledger::reserve(bus, ticket.seats_booked) {
                        tracing::warn!(%error, ticket_id = %ticket.id, "Ledger out of step with journal");
                    }
                }
                self.ticket_by_booking.insert(ticket.booking_id, ticket.id);
                self.tickets.insert(ticket.id, ticket.clone());
            },
            FleetEvent::TicketCancelled {
                ticket_id,
                bus_id,
                seats,
                at,
            } => {
                // Seats only come back for a ticket that still holds them.
                let Some(ticket) = self
                    .tickets
                    .get_mut(ticket_id)
                    .filter(|t| t.status != TicketStatus::Cancelled)
                else {
                    tracing::warn!(%ticket_id, "Cancellation of an unknown or cancelled ticket ignored");
                    return;
                };
                ticket.status = TicketStatus::Cancelled;
                ticket.cancelled_at = Some(*at);
                if let Some(bus) = self.buses.get_mut(bus_id) {
                    ledger::release(bus, *seats);
                }
            },
            FleetEvent::TicketCompleted { ticket_id, at } => {
                if let Some(ticket) = self.tickets.get_mut(ticket_id) {
                    ticket.status = TicketStatus::Completed;
                    ticket.completed_at = Some(*at);
                }
            },
            FleetEvent::LocationRecorded { bus_id, location } => {
                if let Some(bus) = self.buses.get_mut(bus_id) {
                    bus.location = Some(*location);
                }
            },
        }
    }

    /// Rebuild the fleet from the journal.
    ///
    /// The state's version is the highest slot found. Bus positions are not
    /// journaled and start unknown.
    ///
    /// # Errors
    ///
    /// `Internal` if the journal cannot be read or an event does not decode.
    pub async fn replay(journal: &dyn EventStore) -> BookingResult<Self> {
        let events = journal
            .load_events(StreamId::fleet(), None)
            .await
            .map_err(|e| BookingError::Internal(e.to_string()))?;

        let mut state = Self::new();
        for (version, serialized) in &events {
            state.apply(&decode(serialized)?);
            state.version = *version;
        }

        tracing::info!(
            events = events.len(),
            version = %state.version,
            buses = state.buses.len(),
            bookings = state.bookings.len(),
            "Fleet state rebuilt from journal"
        );
        Ok(state)
    }
}

fn decode(serialized: &SerializedEvent) -> BookingResult<FleetEvent> {
    serialized
        .decode()
        .map_err(|e| BookingError::Internal(format!("{}: {e}", serialized.event_type)))
}
