//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use axum::{Json, http::StatusCode};
use busline_core::reducer::Reducer;
use busline_runtime::Store;
use serde::Serialize;

/// Simple health check endpoint (for basic liveness).
///
/// Returns 200 OK to indicate the service is running.
/// This endpoint does NOT check dependencies (database, etc.).
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Body of the readiness response.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Readiness {
    /// `ready` or `shutting_down`
    pub status: &'static str,
    /// Effects still running in the store
    pub pending_effects: usize,
}

/// Readiness derived from the store.
///
/// - 200 OK: the store accepts commands
/// - 503 Service Unavailable: shutdown has started
pub fn readiness<S, A, E, R>(store: &Store<S, A, E, R>) -> (StatusCode, Json<Readiness>)
where
    R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
    A: Clone + Send + 'static,
    S: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let pending_effects = store.pending_effects();

    if store.is_shutting_down() {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Readiness {
                status: "shutting_down",
                pending_effects,
            }),
        )
    } else {
        (
            StatusCode::OK,
            Json(Readiness {
                status: "ready",
                pending_effects,
            }),
        )
    }
}
