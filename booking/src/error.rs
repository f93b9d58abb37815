//! Errors returned by booking operations.
//!
//! Every variant carries a stable kind tag ([`BookingError::kind`]) and maps
//! to one HTTP status. None of them are fatal to the process.

use crate::hub::HubError;
use crate::types::Denial;
use axum::http::StatusCode;
use busline_web::AppError;
use thiserror::Error;

/// Result alias for booking operations.
pub type BookingResult<T> = Result<T, BookingError>;

/// Why a booking operation did not happen.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// No or invalid credential
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Valid credential, but the policy gate said no
    #[error("Forbidden: {0}")]
    Forbidden(Denial),

    /// A referenced entity does not exist
    #[error("{resource} with id {id} not found")]
    NotFound {
        /// Kind of entity
        resource: &'static str,
        /// The id that was looked up
        id: String,
    },

    /// The state machine does not allow the transition
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Not enough free seats for the ticket
    #[error("Only {available} seats available, {requested} requested")]
    InsufficientSeats {
        /// Seats asked for
        requested: u32,
        /// Seats free on the bus
        available: u32,
    },

    /// The bus is full, nothing can be accepted
    #[error("No seats available on this bus")]
    NoSeatsAvailable,

    /// The passenger already has an open booking on the bus
    #[error("You already have a booking request for this bus")]
    DuplicateBooking,

    /// The booking already has a ticket
    #[error("Ticket already confirmed for this booking")]
    DuplicateTicket,

    /// The bus takes no new bookings
    #[error("Bus is no longer available")]
    BusInactive,

    /// Tickets need an accepted booking
    #[error("Booking must be accepted before confirming ticket, it is {0}")]
    BookingNotAccepted(String),

    /// The boarding point is not on the booking's bus
    #[error("Boarding point not found for this bus")]
    InvalidBoardingPoint,

    /// Malformed input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Storage or connectivity failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BookingError {
    /// Shorthand for [`BookingError::NotFound`].
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::InsufficientSeats { .. } => "INSUFFICIENT_SEATS",
            Self::NoSeatsAvailable => "NO_SEATS_AVAILABLE",
            Self::DuplicateBooking => "DUPLICATE_BOOKING",
            Self::DuplicateTicket => "DUPLICATE_TICKET",
            Self::BusInactive => "BUS_INACTIVE",
            Self::BookingNotAccepted(_) => "BOOKING_NOT_ACCEPTED",
            Self::InvalidBoardingPoint => "INVALID_BOARDING_POINT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidTransition(_)
            | Self::InsufficientSeats { .. }
            | Self::NoSeatsAvailable
            | Self::DuplicateBooking
            | Self::DuplicateTicket
            | Self::BusInactive
            | Self::BookingNotAccepted(_) => StatusCode::CONFLICT,
            Self::InvalidBoardingPoint | Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Denial> for BookingError {
    fn from(denial: Denial) -> Self {
        Self::Forbidden(denial)
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            // Storage details stay in the logs.
            BookingError::Internal(detail) => AppError::internal("An internal error occurred")
                .with_source(anyhow::anyhow!(detail)),
            other => AppError::with_code(other.status(), other.kind(), other.to_string()),
        }
    }
}

impl From<HubError> for AppError {
    fn from(err: HubError) -> Self {
        AppError::unavailable(err.to_string())
    }
}
