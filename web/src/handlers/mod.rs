//! Handlers shared by every service.

pub mod health;
pub mod websocket;

pub use health::{Readiness, health_check, readiness};
pub use websocket::{ControlMessage, SessionConfig, SessionEnd, run_session};
