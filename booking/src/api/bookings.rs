//! Booking endpoints.
//!
//! - POST /api/bookings - Request a seat on a bus (passenger)
//! - GET /api/bookings/pending - Requests waiting for a decision (supervisor)
//! - GET /api/bookings/mine - The caller's bookings (passenger)
//! - GET /api/bookings/:id - One booking with bus, boarding points and ticket
//! - POST /api/bookings/:id/accept - Accept a pending request (supervisor)
//! - POST /api/bookings/:id/reject - Reject a pending request (supervisor)
//! - POST /api/bookings/:id/cancel - Withdraw a booking (passenger or supervisor)
//!
//! # State Machine
//!
//! ```text
//! pending → accepted → cancelled
//!    ↓  ↘
//! rejected  cancelled
//! ```
//!
//! Accepting does not take seats; confirming a ticket does.

use crate::fleet::views::{self, BookingDetail, BookingSummary, Page, PendingBooking};
use crate::fleet::{Command, Outcome};
use crate::server::state::{AppState, Caller, unexpected};
use crate::types::{BoardingPoint, Booking, BookingId, BookingStatus, BusId, UserId};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use busline_web::AppError;
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to book a seat.
#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    /// Bus to travel on
    pub bus_id: BusId,
}

/// Optional reason for rejecting or cancelling.
#[derive(Debug, Default, Deserialize)]
pub struct ReasonRequest {
    /// Free text, at most 500 characters
    #[serde(default)]
    pub reason: Option<String>,
}

/// Filters for the pending list.
#[derive(Debug, Default, Deserialize)]
pub struct PendingQuery {
    /// Only this bus; every supervised bus if absent
    pub bus_id: Option<BusId>,
    /// 1-based page
    pub page: Option<u32>,
    /// Page size
    pub limit: Option<u32>,
}

/// Paging for list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// 1-based page
    pub page: Option<u32>,
    /// Page size
    pub limit: Option<u32>,
}

/// What the supervisor needs to contact the passenger after accepting.
#[derive(Debug, Serialize)]
pub struct BookingAcceptance {
    /// Booking ID
    pub booking_id: BookingId,
    /// Always `accepted`
    pub status: BookingStatus,
    /// Passenger
    pub passenger_id: UserId,
    /// Passenger's name, if the directory knows it
    pub passenger_name: Option<String>,
    /// Passenger's phone, if the directory knows it
    pub passenger_phone: Option<String>,
    /// Where the passenger can board, in route order
    pub available_boarding_points: Vec<BoardingPoint>,
}

fn booking_of(outcome: Outcome) -> Result<Booking, AppError> {
    match outcome {
        Outcome::Booking(booking) => Ok(booking),
        other => Err(unexpected(&other)),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Request a seat.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/bookings \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"bus_id": "550e8400-e29b-41d4-a716-446655440000"}'
/// ```
pub async fn create_booking(
    Caller(principal): Caller,
    State(state): State<AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let outcome = state
        .dispatch(principal, Command::CreateBooking { bus_id: request.bus_id })
        .await?;
    Ok((StatusCode::CREATED, Json(booking_of(outcome)?)))
}

/// Pending requests, oldest first.
pub async fn list_pending(
    Caller(principal): Caller,
    State(state): State<AppState>,
    Query(query): Query<PendingQuery>,
) -> Result<Json<Vec<PendingBooking>>, AppError> {
    let page = Page::new(query.page, query.limit)?;
    let pending = state
        .query(|fleet| views::pending_bookings(fleet, &principal, query.bus_id, page))
        .await?;
    Ok(Json(pending))
}

/// The caller's bookings, newest first.
pub async fn list_mine(
    Caller(principal): Caller,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<BookingSummary>>, AppError> {
    let page = Page::new(query.page, query.limit)?;
    let mine = state
        .query(|fleet| views::my_bookings(fleet, &principal, page))
        .await?;
    Ok(Json(mine))
}

/// One booking in full.
pub async fn get_booking(
    Caller(principal): Caller,
    State(state): State<AppState>,
    Path(booking_id): Path<BookingId>,
) -> Result<Json<BookingDetail>, AppError> {
    let detail = state
        .query(|fleet| views::booking_detail(fleet, &principal, booking_id))
        .await?;
    Ok(Json(detail))
}

/// Accept a pending request.
///
/// The response carries the passenger's contact details and the bus's
/// boarding points so the supervisor can arrange pickup.
pub async fn accept_booking(
    Caller(principal): Caller,
    State(state): State<AppState>,
    Path(booking_id): Path<BookingId>,
) -> Result<Json<BookingAcceptance>, AppError> {
    let booking = booking_of(
        state
            .dispatch(principal, Command::AcceptBooking { booking_id })
            .await?,
    )?;

    let available_boarding_points = state
        .query(|fleet| views::boarding_points(fleet, booking.bus_id))
        .await?;
    let profile = state.identity.profile(booking.passenger).await;

    Ok(Json(BookingAcceptance {
        booking_id: booking.id,
        status: booking.status,
        passenger_id: booking.passenger,
        passenger_name: profile.as_ref().map(|p| p.name.clone()),
        passenger_phone: profile.map(|p| p.phone),
        available_boarding_points,
    }))
}

/// Reject a pending request.
pub async fn reject_booking(
    Caller(principal): Caller,
    State(state): State<AppState>,
    Path(booking_id): Path<BookingId>,
    request: Option<Json<ReasonRequest>>,
) -> Result<Json<Booking>, AppError> {
    let Json(ReasonRequest { reason }) = request.unwrap_or_default();
    let outcome = state
        .dispatch(principal, Command::RejectBooking { booking_id, reason })
        .await?;
    Ok(Json(booking_of(outcome)?))
}

/// Withdraw a booking; a confirmed ticket on it is cancelled first.
pub async fn cancel_booking(
    Caller(principal): Caller,
    State(state): State<AppState>,
    Path(booking_id): Path<BookingId>,
    request: Option<Json<ReasonRequest>>,
) -> Result<Json<Booking>, AppError> {
    let Json(ReasonRequest { reason }) = request.unwrap_or_default();
    let outcome = state
        .dispatch(principal, Command::CancelBooking { booking_id, reason })
        .await?;
    Ok(Json(booking_of(outcome)?))
}
