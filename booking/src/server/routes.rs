//! Router configuration.

use super::health::{health_check, readiness_check};
use super::state::AppState;
use crate::api::{bookings, buses, tickets, websocket};
use axum::{
    Router,
    routing::{get, post, put},
};
use busline_web::correlation_id_layer;
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// - `/health`, `/ready`: probes, no authentication
/// - `/api/...`: JSON commands and queries, bearer authentication
/// - `/ws/...`: live channels, token in the query string
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Bookings
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings/pending", get(bookings::list_pending))
        .route("/bookings/mine", get(bookings::list_mine))
        .route("/bookings/:id", get(bookings::get_booking))
        .route("/bookings/:id/accept", post(bookings::accept_booking))
        .route("/bookings/:id/reject", post(bookings::reject_booking))
        .route("/bookings/:id/cancel", post(bookings::cancel_booking))
        // Tickets
        .route("/tickets", post(tickets::confirm_ticket))
        .route("/tickets/mine", get(tickets::list_mine))
        .route("/tickets/:id/cancel", post(tickets::cancel_ticket))
        .route("/tickets/:id/complete", post(tickets::complete_ticket))
        // Buses
        .route("/buses", post(buses::register_bus))
        .route("/buses/:id/supervisor", put(buses::assign_supervisor))
        .route("/buses/:id/active", put(buses::set_active))
        .route(
            "/buses/:id/boarding-points",
            post(buses::add_boarding_point).get(buses::list_boarding_points),
        )
        .route(
            "/buses/:id/location",
            put(buses::update_location).get(buses::get_location),
        );

    let ws_routes = Router::new()
        .route("/notifications", get(websocket::notifications))
        .route("/buses/:id/location", get(websocket::bus_location));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .nest("/ws", ws_routes)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
