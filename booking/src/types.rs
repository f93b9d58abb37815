//! Domain types for the booking service.
//!
//! Identifiers, money, roles and the four records the service keeps:
//! [`Bus`], [`BoardingPoint`], [`Booking`] and [`Ticket`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a user (passenger, supervisor or owner)
    UserId
);
uuid_id!(
    /// Identifier of a bus
    BusId
);
uuid_id!(
    /// Identifier of a booking request
    BookingId
);
uuid_id!(
    /// Identifier of a ticket
    TicketId
);
uuid_id!(
    /// Identifier of a boarding point
    BoardingPointId
);

// ============================================================================
// Money
// ============================================================================

/// An amount in minor currency units (cents).
///
/// Integer arithmetic keeps `total_fare == fare_per_seat * seats` exact.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Amount from minor units
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Amount in minor units
    #[must_use]
    pub const fn cents(self) -> u64 {
        self.0
    }

    /// Multiply by a seat count, `None` on overflow
    #[must_use]
    pub const fn times(self, seats: u32) -> Option<Self> {
        match self.0.checked_mul(seats as u64) {
            Some(total) => Some(Self(total)),
            None => None,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Identity
// ============================================================================

/// The role a user acts in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Requests seats and holds tickets
    Passenger,
    /// Runs a bus: decides on bookings and reports its position
    Supervisor,
    /// Owns buses
    Owner,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passenger => write!(f, "passenger"),
            Self::Supervisor => write!(f, "supervisor"),
            Self::Owner => write!(f, "owner"),
        }
    }
}

/// An authenticated caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Who is calling
    pub user_id: UserId,
    /// In which role
    pub role: Role,
    /// Inactive accounts are denied everything
    pub active: bool,
}

impl Principal {
    /// An active principal
    #[must_use]
    pub const fn new(user_id: UserId, role: Role) -> Self {
        Self {
            user_id,
            role,
            active: true,
        }
    }
}

/// Why the access policy gate said no.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Denial {
    /// The caller does not own the resource
    NotOwner,
    /// The caller is not the supervisor assigned to the bus
    NotAssignedSupervisor,
    /// The caller's role cannot perform the operation
    WrongRole,
    /// The caller's account is deactivated
    AccountInactive,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotOwner => write!(f, "caller does not own this resource"),
            Self::NotAssignedSupervisor => write!(f, "caller is not the supervisor of this bus"),
            Self::WrongRole => write!(f, "caller's role cannot perform this operation"),
            Self::AccountInactive => write!(f, "account is inactive"),
        }
    }
}

// ============================================================================
// Bus
// ============================================================================

/// Service class of a bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BusType {
    /// Air-conditioned seating
    #[serde(rename = "AC")]
    Ac,
    /// Regular seating
    #[serde(rename = "Non-AC")]
    NonAc,
    /// Air-conditioned sleeper
    #[serde(rename = "AC Sleeper")]
    AcSleeper,
}

/// A position sample.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees, -90..=90
    pub lat: f64,
    /// Longitude in degrees, -180..=180
    pub lng: f64,
    /// When the sample was taken
    pub recorded_at: DateTime<Utc>,
}

/// A bus and its seat inventory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    /// Bus ID
    pub id: BusId,
    /// Registration number shown to passengers
    pub bus_number: String,
    /// Route origin
    pub route_from: String,
    /// Route destination
    pub route_to: String,
    /// Scheduled departure
    pub departure_time: DateTime<Utc>,
    /// Service class
    pub bus_type: BusType,
    /// Price of one seat
    pub fare: Money,
    /// Seats on the bus
    pub seat_capacity: u32,
    /// Seats not held by a confirmed ticket; `0..=seat_capacity`
    pub available_seats: u32,
    /// Owning user
    pub owner: UserId,
    /// Assigned supervisor
    pub supervisor: Option<UserId>,
    /// Last reported position
    pub location: Option<Location>,
    /// Inactive buses take no new bookings
    pub active: bool,
}

impl Bus {
    /// `"from - to"`
    #[must_use]
    pub fn route(&self) -> String {
        format!("{} - {}", self.route_from, self.route_to)
    }
}

/// A named pickup location on a bus's route.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardingPoint {
    /// Boarding point ID
    pub id: BoardingPointId,
    /// Bus it belongs to
    pub bus_id: BusId,
    /// Display name
    pub name: String,
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lng: f64,
    /// Position along the route, unique per bus
    pub sequence_order: u32,
}

// ============================================================================
// Booking
// ============================================================================

/// Booking lifecycle.
///
/// ```text
/// pending ──> accepted ──> cancelled
///    │
///    ├──> rejected
///    └──> cancelled
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Waiting for the supervisor
    Pending,
    /// Supervisor said yes; a ticket may be confirmed
    Accepted,
    /// Supervisor said no
    Rejected,
    /// Withdrawn by the passenger or supervisor
    Cancelled,
}

impl BookingStatus {
    /// Whether the state machine allows `self -> next`
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Accepted | Self::Rejected | Self::Cancelled)
                | (Self::Accepted, Self::Cancelled)
        )
    }

    /// Pending and accepted bookings still hold a claim on the bus
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Accepted)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Accepted => write!(f, "accepted"),
            Self::Rejected => write!(f, "rejected"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A passenger's request to travel on a bus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking ID
    pub id: BookingId,
    /// Requesting passenger
    pub passenger: UserId,
    /// Requested bus
    pub bus_id: BusId,
    /// Current status
    pub status: BookingStatus,
    /// When the request was made
    pub request_time: DateTime<Utc>,
    /// When it was accepted
    pub accepted_time: Option<DateTime<Utc>>,
    /// When it was rejected
    pub rejected_time: Option<DateTime<Utc>>,
    /// When it was cancelled
    pub cancelled_time: Option<DateTime<Utc>>,
    /// Supervisor's reason for rejecting
    pub rejection_reason: Option<String>,
    /// Reason given when cancelling
    pub cancellation_reason: Option<String>,
}

// ============================================================================
// Ticket
// ============================================================================

/// Ticket lifecycle: `confirmed -> {completed, cancelled}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    /// Seats are held
    Confirmed,
    /// Trip done
    Completed,
    /// Seats returned
    Cancelled,
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed => write!(f, "confirmed"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(Self::Confirmed),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown ticket status '{other}'")),
        }
    }
}

/// Seats allocated to exactly one accepted booking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Ticket ID
    pub id: TicketId,
    /// The booking this ticket fulfils (1:1)
    pub booking_id: BookingId,
    /// Where the passenger boards
    pub boarding_point_id: BoardingPointId,
    /// Seats held, 1..=10
    pub seats_booked: u32,
    /// Bus fare at confirmation time
    pub fare_per_seat: Money,
    /// `fare_per_seat * seats_booked`
    pub total_fare: Money,
    /// Current status
    pub status: TicketStatus,
    /// When the ticket was confirmed
    pub created_at: DateTime<Utc>,
    /// When the trip was marked done
    pub completed_at: Option<DateTime<Utc>>,
    /// When the ticket was cancelled
    pub cancelled_at: Option<DateTime<Utc>>,
}
