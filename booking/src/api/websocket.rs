//! WebSocket endpoints for live updates.
//!
//! ## Connection
//!
//! Browsers cannot set headers on an upgrade, so the token travels in the
//! query string:
//!
//! ```text
//! ws://localhost:8080/ws/notifications?token=<token>
//! ws://localhost:8080/ws/buses/:id/location?token=<token>
//! ```
//!
//! ## Message Format
//!
//! **Server → Client:**
//! ```json
//! {"type": "booking_accepted", "booking_id": "...", "message": "...", "bus_details": {...}, "timestamp": "..."}
//! {"type": "location_update", "bus_id": "...", "location": {"lat": 23.81, "lng": 90.41, "timestamp": "..."}}
//! ```
//!
//! **Client → Server:** `{"type": "ping"}`, answered with `{"type": "pong"}`.
//!
//! The first frame is always a `connected` greeting; for a bus channel it
//! carries the last known position.

use crate::error::BookingError;
use crate::fleet::views;
use crate::hub::{Notification, Subscription, Topic};
use crate::server::state::{AppState, Caller};
use crate::types::{BusId, Denial};
use axum::{
    extract::{Path, State, WebSocketUpgrade},
    response::Response,
};
use busline_web::AppError;
use busline_web::handlers::run_session;
use tracing::{debug, info};

fn serve(
    upgrade: WebSocketUpgrade,
    state: &AppState,
    subscription: Subscription,
    greeting: Notification,
) -> Response {
    let Subscription {
        id,
        topic,
        receiver,
    } = subscription;
    let hub = state.hub.clone();
    let config = state.session;

    upgrade.on_upgrade(move |socket| async move {
        info!(%topic, channel = %id, "WebSocket connected");
        let end = run_session(socket, Some(greeting), receiver, config).await;
        hub.unsubscribe(topic, id).await;
        debug!(%topic, channel = %id, ?end, "WebSocket disconnected");
    })
}

/// Booking and ticket events for the caller.
pub async fn notifications(
    upgrade: WebSocketUpgrade,
    Caller(principal): Caller,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    if !principal.active {
        return Err(BookingError::Forbidden(Denial::AccountInactive).into());
    }

    let subscription = state.hub.subscribe(Topic::User(principal.user_id)).await?;
    let greeting = Notification::user_greeting(principal.role, state.store.environment().clock.now());
    Ok(serve(upgrade, &state, subscription, greeting))
}

/// Position updates for one bus.
///
/// Open to the bus's owner, its supervisor and passengers with an accepted
/// booking on it.
pub async fn bus_location(
    upgrade: WebSocketUpgrade,
    Caller(principal): Caller,
    State(state): State<AppState>,
    Path(bus_id): Path<BusId>,
) -> Result<Response, AppError> {
    let bus = state
        .query(|fleet| views::observable_bus(fleet, &principal, bus_id))
        .await?;

    let subscription = state.hub.subscribe(Topic::Bus(bus_id)).await?;
    let greeting = Notification::bus_greeting(&bus, state.store.environment().clock.now());
    Ok(serve(upgrade, &state, subscription, greeting))
}
