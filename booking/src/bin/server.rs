//! Busline HTTP server.
//!
//! # Usage
//!
//! ```bash
//! # In-memory journal, tokens from a JSON file
//! BUSLINE_PRINCIPALS_FILE=principals.json cargo run --bin busline-server
//!
//! # PostgreSQL journal
//! DATABASE_URL=postgres://localhost/busline cargo run --bin busline-server
//! ```

use busline_booking::{Config, app, build_router};
use busline_core::environment::SystemClock;
use busline_runtime::metrics::MetricsServer;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often dead channels are swept from the hub.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "busline_booking=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Busline server");

    let config = Config::from_env();
    info!(
        addr = %config.server_addr(),
        journal = if config.postgres.is_some() { "postgres" } else { "memory" },
        "Configuration loaded"
    );

    match config.metrics_addr().parse() {
        Ok(addr) => MetricsServer::new(addr).start()?,
        Err(error) => warn!(%error, addr = %config.metrics_addr(), "Invalid metrics address, metrics disabled"),
    }

    let journal = app::connect_journal(&config).await?;
    let identity = app::load_identity(&config)?;
    let state = app::build_state(&config, journal, identity, Arc::new(SystemClock)).await?;

    let store = state.store.clone();
    let hub = state.hub.clone();
    let sweeper = hub.spawn_sweeper(SWEEP_INTERVAL.min(config.realtime.ping_interval()));

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.server_addr()).await?;
    info!(addr = %config.server_addr(), "Busline server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Draining in-flight commands");
    if let Err(error) = store.shutdown(config.shutdown_timeout()).await {
        warn!(%error, "Store did not drain before the timeout");
    }
    hub.shutdown().await;
    sweeper.abort();

    info!("Busline server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            warn!(%error, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(error) => {
                warn!(%error, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
