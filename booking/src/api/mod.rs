//! HTTP and WebSocket handlers, organized by resource:
//! - Bookings: requesting seats and the supervisor's decision
//! - Tickets: confirming, cancelling and completing
//! - Buses: fleet plumbing and the position feed
//! - WebSocket: live notifications

pub mod bookings;
pub mod buses;
pub mod tickets;
pub mod websocket;
