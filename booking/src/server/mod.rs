//! HTTP server module.
//!
//! - Application state and the authenticated-caller extractor
//! - Health check endpoints
//! - Router configuration

pub mod health;
pub mod routes;
pub mod state;

pub use health::health_check;
pub use routes::build_router;
pub use state::{AppState, Caller};
