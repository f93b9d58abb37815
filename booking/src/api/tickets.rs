//! Ticket endpoints.
//!
//! - POST /api/tickets - Take seats on an accepted booking (passenger)
//! - GET /api/tickets/mine - The caller's tickets, optionally by status
//! - POST /api/tickets/:id/cancel - Give the seats back (passenger)
//! - POST /api/tickets/:id/complete - Mark the trip done (supervisor)
//!
//! ```text
//! confirmed → completed
//!     ↓
//! cancelled
//! ```

use super::bookings::ReasonRequest;
use crate::fleet::views::{self, Page, TicketView};
use crate::fleet::{Command, Outcome};
use crate::hub::BusSummary;
use crate::server::state::{AppState, Caller, unexpected};
use crate::types::{BoardingPoint, BoardingPointId, BookingId, Money, Ticket, TicketId, TicketStatus};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use busline_web::AppError;
use serde::{Deserialize, Serialize};

/// Request to confirm a ticket.
#[derive(Debug, Deserialize)]
pub struct ConfirmTicketRequest {
    /// Accepted booking
    pub booking_id: BookingId,
    /// Pickup location on the booking's bus
    pub boarding_point_id: BoardingPointId,
    /// Seats wanted, 1 to 10
    pub seats_booked: u32,
}

/// Filters for the caller's tickets.
#[derive(Debug, Default, Deserialize)]
pub struct TicketQuery {
    /// Only tickets in this status
    pub status: Option<TicketStatus>,
    /// 1-based page
    pub page: Option<u32>,
    /// Page size
    pub limit: Option<u32>,
}

/// Response after confirming a ticket.
#[derive(Debug, Serialize)]
pub struct TicketConfirmation {
    /// Ticket ID
    pub ticket_id: TicketId,
    /// Always `confirmed`
    pub status: TicketStatus,
    /// Seats held
    pub seats_booked: u32,
    /// Price per seat
    pub fare_per_seat: Money,
    /// Price of the ticket
    pub total_fare: Money,
    /// Where to board
    pub boarding_point: BoardingPoint,
    /// The trip
    pub bus_details: BusSummary,
    /// Message for the user
    pub message: String,
}

fn ticket_of(outcome: Outcome) -> Result<Ticket, AppError> {
    match outcome {
        Outcome::Ticket(ticket) => Ok(ticket),
        other => Err(unexpected(&other)),
    }
}

/// Confirm a ticket.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/tickets \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"booking_id": "...", "boarding_point_id": "...", "seats_booked": 2}'
/// ```
pub async fn confirm_ticket(
    Caller(principal): Caller,
    State(state): State<AppState>,
    Json(request): Json<ConfirmTicketRequest>,
) -> Result<(StatusCode, Json<TicketConfirmation>), AppError> {
    let ticket = ticket_of(
        state
            .dispatch(
                principal,
                Command::ConfirmTicket {
                    booking_id: request.booking_id,
                    boarding_point_id: request.boarding_point_id,
                    seats: request.seats_booked,
                },
            )
            .await?,
    )?;

    let TicketView {
        boarding_point,
        bus,
        ..
    } = state.query(|fleet| views::ticket_view(fleet, ticket.id)).await?;

    Ok((
        StatusCode::CREATED,
        Json(TicketConfirmation {
            ticket_id: ticket.id,
            status: ticket.status,
            seats_booked: ticket.seats_booked,
            fare_per_seat: ticket.fare_per_seat,
            total_fare: ticket.total_fare,
            boarding_point,
            bus_details: bus,
            message: "Ticket confirmed successfully".to_string(),
        }),
    ))
}

/// The caller's tickets, newest first.
pub async fn list_mine(
    Caller(principal): Caller,
    State(state): State<AppState>,
    Query(query): Query<TicketQuery>,
) -> Result<Json<Vec<TicketView>>, AppError> {
    let page = Page::new(query.page, query.limit)?;
    let tickets = state
        .query(|fleet| views::my_tickets(fleet, &principal, query.status, page))
        .await?;
    Ok(Json(tickets))
}

/// Cancel a confirmed ticket; its booking is cancelled with it.
pub async fn cancel_ticket(
    Caller(principal): Caller,
    State(state): State<AppState>,
    Path(ticket_id): Path<TicketId>,
    request: Option<Json<ReasonRequest>>,
) -> Result<Json<Ticket>, AppError> {
    let Json(ReasonRequest { reason }) = request.unwrap_or_default();
    let outcome = state
        .dispatch(principal, Command::CancelTicket { ticket_id, reason })
        .await?;
    Ok(Json(ticket_of(outcome)?))
}

/// Mark a confirmed ticket's trip as done.
pub async fn complete_ticket(
    Caller(principal): Caller,
    State(state): State<AppState>,
    Path(ticket_id): Path<TicketId>,
) -> Result<Json<Ticket>, AppError> {
    let outcome = state
        .dispatch(principal, Command::CompleteTicket { ticket_id })
        .await?;
    Ok(Json(ticket_of(outcome)?))
}
