//! Health check endpoints.

use super::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use busline_web::handlers::{self, Readiness};

pub use busline_web::handlers::health_check;

/// Readiness check endpoint.
///
/// 503 once shutdown has started, so the load balancer stops routing here
/// while in-flight commands drain.
///
/// ```bash
/// curl http://localhost:8080/ready
/// # {"status":"ready","pending_effects":0}
/// ```
#[allow(clippy::unused_async)]
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    handlers::readiness(&state.store)
}
