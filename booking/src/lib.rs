//! Busline: bus-seat booking coordination.
//!
//! Passengers request seats, supervisors accept or reject the requests,
//! passengers confirm tickets on accepted bookings, and everyone involved
//! follows the bus's position live.
//!
//! # Architecture
//!
//! ```text
//!  HTTP / WS ──> Caller ──> Command ──> FleetStore (single writer)
//!                                          │
//!                     policy ─> booking / ticket / bus rules ─> ledger
//!                                          │
//!                                    FleetEvent(s)
//!                                          │
//!            journal (EventStore) ─> apply to FleetState ─> NotificationHub ─> reply
//!
//!  One command is committed at a time; the next is decided after the reply.
//! ```
//!
//! # Two-phase seat commitment
//!
//! Accepting a booking only checks that the bus is not full; it takes no
//! seats. Confirming a ticket debits the seat ledger. Supervisors can
//! therefore accept more bookings than there are seats, and the passengers
//! who confirm first get them:
//!
//! ```text
//! accept  : available_seats > 0        (no debit)
//! confirm : seats <= available_seats   (debit)
//! cancel  : credit, clamped to capacity
//! ```
//!
//! # Modules
//!
//! - [`types`]: identifiers, money, roles and the fleet records
//! - [`ledger`]: seat inventory rules
//! - [`policy`]: the access policy gate
//! - [`booking`], [`ticket`], [`bus`]: state transitions
//! - [`fleet`]: events, state, reducer and read views
//! - [`hub`]: live notification channels
//! - [`identity`]: bearer token resolution
//! - [`server`], [`api`]: HTTP and WebSocket surface
//! - [`config`], [`app`]: configuration and wiring

pub mod api;
pub mod app;
pub mod booking;
pub mod bus;
pub mod config;
pub mod error;
pub mod fleet;
pub mod hub;
pub mod identity;
pub mod ledger;
pub mod policy;
pub mod server;
pub mod ticket;
pub mod types;

#[cfg(test)]
mod fixtures;

pub use config::Config;
pub use error::{BookingError, BookingResult};
pub use fleet::{Command, FleetAction, FleetEnvironment, FleetReducer, FleetState, FleetStore, Outcome};
pub use hub::{HubConfig, Notification, NotificationHub, Topic};
pub use identity::{IdentityProvider, TokenDirectory};
pub use server::{AppState, build_router};
