//! Messages pushed to live observers.
//!
//! Each payload carries what a client needs to update its view without
//! another request.

use crate::types::{
    BoardingPoint, Booking, BookingId, Bus, BusId, BusType, Location, Money, Ticket, TicketId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bus details sent with an accepted booking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusSummary {
    /// Bus ID
    pub bus_id: BusId,
    /// Registration number
    pub bus_number: String,
    /// `"from - to"`
    pub route: String,
    /// Scheduled departure
    pub departure_time: DateTime<Utc>,
    /// Service class
    pub bus_type: BusType,
    /// Price of one seat
    pub fare: Money,
}

impl From<&Bus> for BusSummary {
    fn from(bus: &Bus) -> Self {
        Self {
            bus_id: bus.id,
            bus_number: bus.bus_number.clone(),
            route: bus.route(),
            departure_time: bus.departure_time,
            bus_type: bus.bus_type,
            fare: bus.fare,
        }
    }
}

/// Ticket details sent on confirmation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TicketSummary {
    /// Booking the ticket fulfils
    pub booking_id: BookingId,
    /// Registration number
    pub bus_number: String,
    /// `"from - to"`
    pub route: String,
    /// Scheduled departure
    pub departure_time: DateTime<Utc>,
    /// Where to board
    pub boarding_point: String,
    /// Seats held
    pub seats_booked: u32,
    /// Amount due
    pub total_fare: Money,
}

/// A position as sent to clients.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationPayload {
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lng: f64,
    /// When it was recorded
    pub timestamp: DateTime<Utc>,
}

impl From<Location> for LocationPayload {
    fn from(location: Location) -> Self {
        Self {
            lat: location.lat,
            lng: location.lng,
            timestamp: location.recorded_at,
        }
    }
}

/// Server to client message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Greeting sent when a channel opens
    Connected {
        /// Human-readable line
        message: String,
        /// Bus being watched, for bus channels
        #[serde(skip_serializing_if = "Option::is_none")]
        bus_id: Option<BusId>,
        /// Last known position, for bus channels
        #[serde(skip_serializing_if = "Option::is_none")]
        current_location: Option<LocationPayload>,
        /// Server time
        timestamp: DateTime<Utc>,
    },
    /// The supervisor accepted a booking
    BookingAccepted {
        /// Booking
        booking_id: BookingId,
        /// Human-readable line
        message: String,
        /// The bus
        bus_details: BusSummary,
        /// When
        timestamp: DateTime<Utc>,
    },
    /// The supervisor rejected a booking
    BookingRejected {
        /// Booking
        booking_id: BookingId,
        /// Human-readable line
        message: String,
        /// Supervisor's reason
        reason: Option<String>,
        /// When
        timestamp: DateTime<Utc>,
    },
    /// A ticket was issued
    TicketConfirmed {
        /// Ticket
        ticket_id: TicketId,
        /// Human-readable line
        message: String,
        /// Trip details
        ticket_details: TicketSummary,
        /// When
        timestamp: DateTime<Utc>,
    },
    /// The bus moved
    LocationUpdate {
        /// Bus
        bus_id: BusId,
        /// New position
        location: LocationPayload,
    },
}

impl Notification {
    /// Wire tag of the message
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::BookingAccepted { .. } => "booking_accepted",
            Self::BookingRejected { .. } => "booking_rejected",
            Self::TicketConfirmed { .. } => "ticket_confirmed",
            Self::LocationUpdate { .. } => "location_update",
        }
    }

    /// Booking accepted, for the passenger
    #[must_use]
    pub fn booking_accepted(booking: &Booking, bus: &Bus) -> Self {
        Self::BookingAccepted {
            booking_id: booking.id,
            message: "Your booking request has been accepted!".to_string(),
            bus_details: BusSummary::from(bus),
            timestamp: booking.accepted_time.unwrap_or(booking.request_time),
        }
    }

    /// Booking rejected, for the passenger
    #[must_use]
    pub fn booking_rejected(booking: &Booking) -> Self {
        Self::BookingRejected {
            booking_id: booking.id,
            message: "Your booking request has been rejected.".to_string(),
            reason: booking.rejection_reason.clone(),
            timestamp: booking.rejected_time.unwrap_or(booking.request_time),
        }
    }

    /// Ticket confirmed, for the passenger
    #[must_use]
    pub fn ticket_confirmed(ticket: &Ticket, bus: &Bus, boarding_point: &BoardingPoint) -> Self {
        Self::TicketConfirmed {
            ticket_id: ticket.id,
            message: "Your ticket has been confirmed!".to_string(),
            ticket_details: TicketSummary {
                booking_id: ticket.booking_id,
                bus_number: bus.bus_number.clone(),
                route: bus.route(),
                departure_time: bus.departure_time,
                boarding_point: boarding_point.name.clone(),
                seats_booked: ticket.seats_booked,
                total_fare: ticket.total_fare,
            },
            timestamp: ticket.created_at,
        }
    }

    /// New position, for everyone watching the bus
    #[must_use]
    pub fn location_update(bus_id: BusId, location: Location) -> Self {
        Self::LocationUpdate {
            bus_id,
            location: location.into(),
        }
    }

    /// Greeting for a bus channel
    #[must_use]
    pub fn bus_greeting(bus: &Bus, now: DateTime<Utc>) -> Self {
        Self::Connected {
            message: format!("Connected to bus {} location updates", bus.bus_number),
            bus_id: Some(bus.id),
            current_location: bus.location.map(LocationPayload::from),
            timestamp: now,
        }
    }

    /// Greeting for a user channel
    #[must_use]
    pub fn user_greeting(role: impl std::fmt::Display, now: DateTime<Utc>) -> Self {
        Self::Connected {
            message: format!("Connected as {role}"),
            bus_id: None,
            current_location: None,
            timestamp: now,
        }
    }
}
