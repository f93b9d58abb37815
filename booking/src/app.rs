//! Application wiring.
//!
//! Connects the journal, loads the identity directory, rebuilds the fleet
//! from the journal and assembles the [`AppState`] handed to the router.
//!
//! ```rust,ignore
//! let config = Config::from_env();
//! let journal = app::connect_journal(&config).await?;
//! let identity = app::load_identity(&config)?;
//! let state = app::build_state(&config, journal, identity, Arc::new(SystemClock)).await?;
//! let router = build_router(state);
//! ```

use crate::config::Config;
use crate::error::BookingResult;
use crate::fleet::{FleetEnvironment, FleetReducer, FleetState, FleetStore};
use crate::hub::{HubConfig, NotificationHub};
use crate::identity::{AuthError, IdentityProvider, TokenDirectory};
use crate::server::AppState;
use busline_core::environment::Clock;
use busline_core::event_store::EventStore;
use busline_postgres::PostgresEventStore;
use busline_runtime::StoreConfig;
use busline_testing::InMemoryEventStore;
use busline_web::handlers::SessionConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

impl From<&Config> for HubConfig {
    fn from(config: &Config) -> Self {
        Self {
            channel_capacity: config.realtime.channel_capacity,
            max_channels: config.realtime.max_connections,
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            ping_interval: config.realtime.ping_interval(),
            idle_timeout: config.realtime.idle_timeout(),
        }
    }
}

impl From<&Config> for StoreConfig {
    fn from(config: &Config) -> Self {
        StoreConfig::default()
            .with_broadcast_capacity(config.store.broadcast_capacity)
            .with_shutdown_timeout(config.shutdown_timeout())
    }
}

/// Open the event journal.
///
/// `PostgreSQL` (migrated on connect) when `DATABASE_URL` is set, an
/// in-memory journal otherwise.
///
/// # Errors
///
/// Connection or migration failures.
pub async fn connect_journal(config: &Config) -> anyhow::Result<Arc<dyn EventStore>> {
    match &config.postgres {
        Some(postgres) => {
            info!(max_connections = postgres.max_connections, "Connecting to event journal");
            let store = PostgresEventStore::connect(
                &postgres.url,
                postgres.max_connections,
                Duration::from_secs(postgres.connect_timeout),
            )
            .await?;
            store.migrate().await?;
            info!("Event journal ready (PostgreSQL)");
            Ok(Arc::new(store))
        },
        None => {
            warn!("DATABASE_URL not set, journal is in memory and lost on restart");
            Ok(Arc::new(InMemoryEventStore::new()))
        },
    }
}

/// Load the token directory.
///
/// # Errors
///
/// [`AuthError::Directory`] if the configured file cannot be read.
pub fn load_identity(config: &Config) -> Result<Arc<dyn IdentityProvider>, AuthError> {
    match &config.auth.principals_file {
        Some(path) => Ok(Arc::new(TokenDirectory::from_json_file(path)?)),
        None => {
            warn!("BUSLINE_PRINCIPALS_FILE not set, every request will be unauthorized");
            Ok(Arc::new(TokenDirectory::new()))
        },
    }
}

/// Rebuild the fleet from `journal` and assemble the handler state.
///
/// # Errors
///
/// `Internal` if the journal cannot be replayed.
pub async fn build_state(
    config: &Config,
    journal: Arc<dyn EventStore>,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
) -> BookingResult<AppState> {
    let fleet = FleetState::replay(journal.as_ref()).await?;
    let hub = NotificationHub::new(HubConfig::from(config));
    let environment = FleetEnvironment::new(clock, journal, hub);
    let store = FleetStore::with_config(fleet, FleetReducer, environment, StoreConfig::from(config));

    Ok(AppState::new(
        store,
        identity,
        SessionConfig::from(config),
        config.store.command_timeout(),
    ))
}
