//! Axum integration for the Busline booking service.
//!
//! Handlers stay thin: extract the caller and the request, turn them into
//! an action, send it through the [`Store`](busline_runtime::Store) and map
//! the outcome to a response.
//!
//! ```text
//! HTTP request ──> extractors ──> action ──> Store ──> reply action ──> response
//! ```
//!
//! This crate holds the pieces that do not know about bookings:
//! the error type, extractors, request middleware, health probes and the
//! WebSocket session driver.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

pub use error::AppError;
pub use extractors::{BearerToken, CorrelationId};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
