//! Read side of the fleet.
//!
//! Queries run under the store's read lock via `Store::state` and apply the
//! same policy gate as commands. Responses are denormalized so a client
//! needs one request per screen.

use super::state::FleetState;
use crate::error::{BookingError, BookingResult};
use crate::hub::{BusSummary, LocationPayload};
use crate::policy;
use crate::types::{
    BoardingPoint, Booking, BookingId, BookingStatus, Bus, BusId, Principal, Ticket, TicketId,
    TicketStatus,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default page size.
pub const DEFAULT_LIMIT: u32 = 20;
/// Largest page size.
pub const MAX_LIMIT: u32 = 100;

/// A validated page request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number
    pub page: u32,
    /// Items per page
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Page {
    /// Validate optional query parameters.
    ///
    /// # Errors
    ///
    /// `Validation` if `page < 1` or `limit` is outside `1..=100`.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> BookingResult<Self> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if page == 0 {
            return Err(BookingError::Validation("page must be at least 1".to_string()));
        }
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(BookingError::Validation(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        Ok(Self { page, limit })
    }

    fn slice<T>(self, items: Vec<T>) -> Vec<T> {
        let offset = (self.page as usize - 1).saturating_mul(self.limit as usize);
        items
            .into_iter()
            .skip(offset)
            .take(self.limit as usize)
            .collect()
    }
}

/// A request awaiting the supervisor.
///
/// Who the passenger is stays hidden until the booking is accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PendingBooking {
    /// Booking
    pub id: BookingId,
    /// Requested bus
    pub bus_id: BusId,
    /// Always `pending`
    pub status: BookingStatus,
    /// When it was requested
    pub request_time: DateTime<Utc>,
}

impl From<&Booking> for PendingBooking {
    fn from(booking: &Booking) -> Self {
        Self {
            id: booking.id,
            bus_id: booking.bus_id,
            status: booking.status,
            request_time: booking.request_time,
        }
    }
}

/// A booking with the bus it is for.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BookingSummary {
    /// The booking
    #[serde(flatten)]
    pub booking: Booking,
    /// Registration number
    pub bus_number: String,
    /// `"from - to"`
    pub route: String,
}

/// Everything about one booking.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BookingDetail {
    /// The booking
    pub booking: Booking,
    /// Its bus
    pub bus: Bus,
    /// Where the passenger may board, in route order
    pub boarding_points: Vec<BoardingPoint>,
    /// The ticket, once confirmed
    pub ticket: Option<Ticket>,
}

/// A ticket with its trip details.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TicketView {
    /// The ticket
    #[serde(flatten)]
    pub ticket: Ticket,
    /// Where the passenger boards
    pub boarding_point: BoardingPoint,
    /// The bus
    pub bus: BusSummary,
}

/// Where a bus is.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BusLocation {
    /// Bus
    pub bus_id: BusId,
    /// Registration number
    pub bus_number: String,
    /// `"from - to"`
    pub route: String,
    /// Last report, if any
    pub location: Option<LocationPayload>,
}

fn summary(state: &FleetState, booking: &Booking) -> BookingResult<BookingSummary> {
    let bus = state.bus(booking.bus_id)?;
    Ok(BookingSummary {
        booking: booking.clone(),
        bus_number: bus.bus_number.clone(),
        route: bus.route(),
    })
}

/// Pending requests, oldest first, for one bus or every bus the caller
/// supervises.
///
/// # Errors
///
/// `Validation`, `NotFound`, `Forbidden`.
pub fn pending_bookings(
    state: &FleetState,
    principal: &Principal,
    bus_id: Option<BusId>,
    page: Page,
) -> BookingResult<Vec<PendingBooking>> {
    let bus = bus_id.map(|id| state.bus(id)).transpose()?;
    policy::can_list_pending(principal, bus)?;

    let mut pending: Vec<PendingBooking> = state
        .bookings
        .values()
        .filter(|b| b.status == BookingStatus::Pending)
        .filter(|b| match bus_id {
            Some(id) => b.bus_id == id,
            None => state
                .buses
                .get(&b.bus_id)
                .is_some_and(|bus| bus.supervisor == Some(principal.user_id)),
        })
        .map(PendingBooking::from)
        .collect();
    pending.sort_by_key(|b| (b.request_time, b.id));
    Ok(page.slice(pending))
}

/// The caller's own bookings, newest first.
///
/// # Errors
///
/// `Forbidden` unless the caller is an active passenger.
pub fn my_bookings(
    state: &FleetState,
    principal: &Principal,
    page: Page,
) -> BookingResult<Vec<BookingSummary>> {
    policy::can_list_own(principal)?;

    let mut mine: Vec<&Booking> = state
        .bookings
        .values()
        .filter(|b| b.passenger == principal.user_id)
        .collect();
    mine.sort_by(|a, b| b.request_time.cmp(&a.request_time).then(b.id.cmp(&a.id)));

    page.slice(mine)
        .into_iter()
        .map(|booking| summary(state, booking))
        .collect()
}

/// One booking with its bus, boarding points and ticket.
///
/// # Errors
///
/// `NotFound`, `Forbidden`.
pub fn booking_detail(
    state: &FleetState,
    principal: &Principal,
    booking_id: BookingId,
) -> BookingResult<BookingDetail> {
    let booking = state.booking(booking_id)?;
    let bus = state.bus(booking.bus_id)?;
    policy::can_view_booking(principal, booking, bus)?;

    Ok(BookingDetail {
        booking: booking.clone(),
        bus: bus.clone(),
        boarding_points: state.boarding_points_of(bus.id).into_iter().cloned().collect(),
        ticket: state.ticket_for_booking(booking_id).cloned(),
    })
}

/// A ticket with its boarding point and bus.
///
/// # Errors
///
/// `NotFound` if any referenced record is missing.
pub fn ticket_view(state: &FleetState, ticket_id: TicketId) -> BookingResult<TicketView> {
    let ticket = state.ticket(ticket_id)?;
    let booking = state.booking(ticket.booking_id)?;
    let bus = state.bus(booking.bus_id)?;
    let boarding_point = state.boarding_point(ticket.boarding_point_id)?;

    Ok(TicketView {
        ticket: ticket.clone(),
        boarding_point: boarding_point.clone(),
        bus: BusSummary::from(bus),
    })
}

/// The caller's tickets, newest first, optionally by status.
///
/// # Errors
///
/// `Validation`, `Forbidden`.
pub fn my_tickets(
    state: &FleetState,
    principal: &Principal,
    status: Option<TicketStatus>,
    page: Page,
) -> BookingResult<Vec<TicketView>> {
    policy::can_list_own(principal)?;

    let mut mine: Vec<&Ticket> = state
        .tickets
        .values()
        .filter(|t| status.is_none_or(|s| t.status == s))
        .filter(|t| {
            state
                .bookings
                .get(&t.booking_id)
                .is_some_and(|b| b.passenger == principal.user_id)
        })
        .collect();
    mine.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

    page.slice(mine)
        .into_iter()
        .map(|ticket| ticket_view(state, ticket.id))
        .collect()
}

/// A bus the caller may watch.
///
/// # Errors
///
/// `NotFound`, `Forbidden`.
pub fn observable_bus(state: &FleetState, principal: &Principal, bus_id: BusId) -> BookingResult<Bus> {
    let bus = state.bus(bus_id)?;
    let has_accepted = state.has_accepted_booking(principal.user_id, bus_id);
    policy::can_observe_bus(principal, bus, has_accepted)?;
    Ok(bus.clone())
}

/// Last reported position of a bus.
///
/// # Errors
///
/// `NotFound`, `Forbidden`.
pub fn bus_location(state: &FleetState, principal: &Principal, bus_id: BusId) -> BookingResult<BusLocation> {
    let bus = observable_bus(state, principal, bus_id)?;
    Ok(BusLocation {
        bus_id,
        route: bus.route(),
        bus_number: bus.bus_number,
        location: bus.location.map(LocationPayload::from),
    })
}

/// Boarding points of a bus in route order.
///
/// # Errors
///
/// `NotFound` if the bus is unknown.
pub fn boarding_points(state: &FleetState, bus_id: BusId) -> BookingResult<Vec<BoardingPoint>> {
    state.bus(bus_id)?;
    Ok(state.boarding_points_of(bus_id).into_iter().cloned().collect())
}
