//! Bus endpoints.
//!
//! Fleet plumbing for owners, plus the position feed:
//! - POST /api/buses - Register a bus (owner)
//! - PUT /api/buses/:id/supervisor - Assign or remove the supervisor (owner)
//! - PUT /api/buses/:id/active - Open or close the bus for bookings (owner)
//! - POST /api/buses/:id/boarding-points - Add a pickup location (owner)
//! - GET /api/buses/:id/boarding-points - Pickup locations in route order
//! - PUT /api/buses/:id/location - Report the bus's position (supervisor)
//! - GET /api/buses/:id/location - Last reported position

use crate::bus::{NewBoardingPoint, NewBus};
use crate::error::BookingError;
use crate::fleet::views::{self, BusLocation};
use crate::fleet::{Command, Outcome};
use crate::hub::LocationPayload;
use crate::server::state::{AppState, Caller, unexpected};
use crate::types::{BoardingPoint, Bus, BusId, Role, UserId};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use busline_web::AppError;
use serde::Deserialize;

/// Request to change the supervisor.
#[derive(Debug, Deserialize)]
pub struct AssignSupervisorRequest {
    /// New supervisor; `null` removes the current one
    pub supervisor_id: Option<UserId>,
}

/// Request to open or close a bus.
#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    /// New flag
    pub active: bool,
}

/// A position report.
#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    /// Latitude, -90 to 90
    pub lat: f64,
    /// Longitude, -180 to 180
    pub lng: f64,
}

fn bus_of(outcome: Outcome) -> Result<Bus, AppError> {
    match outcome {
        Outcome::Bus(bus) => Ok(bus),
        other => Err(unexpected(&other)),
    }
}

/// Register a bus.
pub async fn register_bus(
    Caller(principal): Caller,
    State(state): State<AppState>,
    Json(request): Json<NewBus>,
) -> Result<(StatusCode, Json<Bus>), AppError> {
    let outcome = state.dispatch(principal, Command::RegisterBus(request)).await?;
    Ok((StatusCode::CREATED, Json(bus_of(outcome)?)))
}

/// Assign or remove the bus's supervisor.
///
/// The new supervisor must be a known user with the supervisor role.
pub async fn assign_supervisor(
    Caller(principal): Caller,
    State(state): State<AppState>,
    Path(bus_id): Path<BusId>,
    Json(request): Json<AssignSupervisorRequest>,
) -> Result<Json<Bus>, AppError> {
    if let Some(user_id) = request.supervisor_id {
        let profile = state
            .identity
            .profile(user_id)
            .await
            .ok_or_else(|| BookingError::not_found("User", user_id))?;
        if profile.role != Role::Supervisor {
            return Err(BookingError::Validation(format!("user {user_id} is not a supervisor")).into());
        }
    }

    let outcome = state
        .dispatch(
            principal,
            Command::AssignSupervisor {
                bus_id,
                supervisor: request.supervisor_id,
            },
        )
        .await?;
    Ok(Json(bus_of(outcome)?))
}

/// Open or close the bus for new bookings.
pub async fn set_active(
    Caller(principal): Caller,
    State(state): State<AppState>,
    Path(bus_id): Path<BusId>,
    Json(request): Json<SetActiveRequest>,
) -> Result<Json<Bus>, AppError> {
    let outcome = state
        .dispatch(
            principal,
            Command::SetBusActive {
                bus_id,
                active: request.active,
            },
        )
        .await?;
    Ok(Json(bus_of(outcome)?))
}

/// Add a boarding point.
pub async fn add_boarding_point(
    Caller(principal): Caller,
    State(state): State<AppState>,
    Path(bus_id): Path<BusId>,
    Json(point): Json<NewBoardingPoint>,
) -> Result<(StatusCode, Json<BoardingPoint>), AppError> {
    match state
        .dispatch(principal, Command::AddBoardingPoint { bus_id, point })
        .await?
    {
        Outcome::BoardingPoint(point) => Ok((StatusCode::CREATED, Json(point))),
        other => Err(unexpected(&other)),
    }
}

/// Boarding points in route order.
pub async fn list_boarding_points(
    Caller(_principal): Caller,
    State(state): State<AppState>,
    Path(bus_id): Path<BusId>,
) -> Result<Json<Vec<BoardingPoint>>, AppError> {
    let points = state
        .query(|fleet| views::boarding_points(fleet, bus_id))
        .await?;
    Ok(Json(points))
}

/// Report the bus's position.
///
/// Observers on the bus channel receive a `location_update`.
pub async fn update_location(
    Caller(principal): Caller,
    State(state): State<AppState>,
    Path(bus_id): Path<BusId>,
    Json(request): Json<LocationRequest>,
) -> Result<Json<BusLocation>, AppError> {
    let bus = bus_of(
        state
            .dispatch(
                principal,
                Command::UpdateLocation {
                    bus_id,
                    lat: request.lat,
                    lng: request.lng,
                },
            )
            .await?,
    )?;

    Ok(Json(BusLocation {
        bus_id: bus.id,
        route: bus.route(),
        bus_number: bus.bus_number,
        location: bus.location.map(LocationPayload::from),
    }))
}

/// Last reported position.
pub async fn get_location(
    Caller(principal): Caller,
    State(state): State<AppState>,
    Path(bus_id): Path<BusId>,
) -> Result<Json<BusLocation>, AppError> {
    let location = state
        .query(|fleet| views::bus_location(fleet, &principal, bus_id))
        .await?;
    Ok(Json(location))
}
