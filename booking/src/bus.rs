//! Buses, their boarding points and position reports.

use crate::error::{BookingError, BookingResult};
use crate::fleet::{Decision, FleetEvent, FleetState, Subject};
use crate::policy;
use crate::types::{
    BoardingPoint, BoardingPointId, Bus, BusId, BusType, Location, Money, Principal, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Largest bus the service accepts.
pub const MAX_SEAT_CAPACITY: u32 = 100;

/// Details of a bus being registered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewBus {
    /// Registration number
    pub bus_number: String,
    /// Route origin
    pub route_from: String,
    /// Route destination
    pub route_to: String,
    /// Scheduled departure
    pub departure_time: DateTime<Utc>,
    /// Service class
    pub bus_type: BusType,
    /// Price of one seat
    pub fare: Money,
    /// Seats on the bus
    pub seat_capacity: u32,
}

/// A pickup location being added to a route.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewBoardingPoint {
    /// Display name
    pub name: String,
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lng: f64,
    /// Position along the route
    pub sequence_order: u32,
}

fn required(field: &str, value: &str) -> BookingResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(BookingError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Reject coordinates outside the globe, NaN included.
///
/// # Errors
///
/// `Validation` when either coordinate is out of range.
pub fn validate_coordinates(lat: f64, lng: f64) -> BookingResult<()> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(BookingError::Validation(
            "lat must be between -90 and 90".to_string(),
        ));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(BookingError::Validation(
            "lng must be between -180 and 180".to_string(),
        ));
    }
    Ok(())
}

/// An owner adds a bus with every seat free.
///
/// # Errors
///
/// `Forbidden`, `Validation`.
pub fn register(state: &FleetState, principal: &Principal, new: NewBus) -> BookingResult<Decision> {
    policy::can_register_bus(principal)?;

    if !(1..=MAX_SEAT_CAPACITY).contains(&new.seat_capacity) {
        return Err(BookingError::Validation(format!(
            "seat_capacity must be between 1 and {MAX_SEAT_CAPACITY}"
        )));
    }
    let bus_number = required("bus_number", &new.bus_number)?;
    if state.buses.values().any(|b| b.bus_number == bus_number) {
        return Err(BookingError::Validation(format!(
            "bus number {bus_number} is already registered"
        )));
    }

    let bus = Bus {
        id: BusId::new(),
        bus_number,
        route_from: required("route_from", &new.route_from)?,
        route_to: required("route_to", &new.route_to)?,
        departure_time: new.departure_time,
        bus_type: new.bus_type,
        fare: new.fare,
        seat_capacity: new.seat_capacity,
        available_seats: new.seat_capacity,
        owner: principal.user_id,
        supervisor: None,
        location: None,
        active: true,
    };

    Ok(Decision::new(
        Subject::Bus(bus.id),
        vec![FleetEvent::BusRegistered { bus }],
    ))
}

/// The owner assigns or removes the bus's supervisor.
///
/// The caller checks that `supervisor` names a supervisor account.
///
/// # Errors
///
/// `NotFound`, `Forbidden`.
pub fn assign_supervisor(
    state: &FleetState,
    principal: &Principal,
    bus_id: BusId,
    supervisor: Option<UserId>,
) -> BookingResult<Decision> {
    let bus = state.bus(bus_id)?;
    policy::can_manage_bus(principal, bus)?;

    Ok(Decision::new(
        Subject::Bus(bus_id),
        vec![FleetEvent::SupervisorAssigned { bus_id, supervisor }],
    ))
}

/// The owner opens or closes the bus for new bookings.
///
/// Existing bookings and tickets are untouched.
///
/// # Errors
///
/// `NotFound`, `Forbidden`.
pub fn set_active(
    state: &FleetState,
    principal: &Principal,
    bus_id: BusId,
    active: bool,
) -> BookingResult<Decision> {
    let bus = state.bus(bus_id)?;
    policy::can_manage_bus(principal, bus)?;

    Ok(Decision::new(
        Subject::Bus(bus_id),
        vec![FleetEvent::BusActivityChanged { bus_id, active }],
    ))
}

/// The owner adds a pickup location to the route.
///
/// # Errors
///
/// `Validation` (including a taken `sequence_order`), `NotFound`, `Forbidden`.
pub fn add_boarding_point(
    state: &FleetState,
    principal: &Principal,
    bus_id: BusId,
    new: NewBoardingPoint,
) -> BookingResult<Decision> {
    let bus = state.bus(bus_id)?;
    policy::can_manage_bus(principal, bus)?;

    let name = required("name", &new.name)?;
    validate_coordinates(new.lat, new.lng)?;
    if state
        .boarding_points_of(bus_id)
        .iter()
        .any(|p| p.sequence_order == new.sequence_order)
    {
        return Err(BookingError::Validation(format!(
            "sequence_order {} is already used on this bus",
            new.sequence_order
        )));
    }

    let point = BoardingPoint {
        id: BoardingPointId::new(),
        bus_id,
        name,
        lat: new.lat,
        lng: new.lng,
        sequence_order: new.sequence_order,
    };

    Ok(Decision::new(
        Subject::BoardingPoint(point.id),
        vec![FleetEvent::BoardingPointAdded { point }],
    ))
}

/// The bus's supervisor reports where the bus is.
///
/// # Errors
///
/// `Validation`, `NotFound`, `Forbidden`.
pub fn update_location(
    state: &FleetState,
    principal: &Principal,
    bus_id: BusId,
    lat: f64,
    lng: f64,
    now: DateTime<Utc>,
) -> BookingResult<Decision> {
    validate_coordinates(lat, lng)?;
    let bus = state.bus(bus_id)?;
    policy::can_update_location(principal, bus)?;

    Ok(Decision::new(
        Subject::Bus(bus_id),
        vec![FleetEvent::LocationRecorded {
            bus_id,
            location: Location {
                lat,
                lng,
                recorded_at: now,
            },
        }],
    ))
}
