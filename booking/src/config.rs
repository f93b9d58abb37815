//! Configuration management for the booking service.
//!
//! Loads configuration from environment variables with sensible defaults.
//! A `.env` file is read by the server binary before this runs.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server
    pub server: ServerConfig,
    /// `PostgreSQL` journal; `None` keeps the journal in memory
    pub postgres: Option<PostgresConfig>,
    /// WebSocket channels and the notification hub
    pub realtime: RealtimeConfig,
    /// Identity directory
    pub auth: AuthConfig,
    /// Fleet store
    pub store: StoreSettings,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Metrics server host (for Prometheus scraping)
    pub metrics_host: String,
    /// Metrics server port
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// `PostgreSQL` configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// `PostgreSQL` connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout: u64,
}

/// Live channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Seconds between server pings
    pub ping_interval_secs: u64,
    /// Seconds without client traffic before a connection is closed
    pub idle_timeout_secs: u64,
    /// Buffered notifications per connection
    pub channel_capacity: usize,
    /// Concurrent connections across the hub
    pub max_connections: usize,
}

/// Identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// JSON file of token directory entries
    pub principals_file: Option<PathBuf>,
}

/// Fleet store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Capacity of the action broadcast used for replies
    pub broadcast_capacity: usize,
    /// Seconds a request waits for its command to be committed
    pub command_timeout_secs: u64,
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key).and_then(|s| s.parse().ok()).unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            server: ServerConfig {
                host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&lookup, "PORT", 8080),
                metrics_host: lookup("METRICS_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                metrics_port: parse_or(&lookup, "METRICS_PORT", 9090),
                shutdown_timeout: parse_or(&lookup, "SHUTDOWN_TIMEOUT", 30),
            },
            postgres: lookup("DATABASE_URL")
                .filter(|url| !url.trim().is_empty())
                .map(|url| PostgresConfig {
                    url,
                    max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10),
                    connect_timeout: parse_or(&lookup, "DATABASE_CONNECT_TIMEOUT", 30),
                }),
            realtime: RealtimeConfig {
                ping_interval_secs: parse_or(&lookup, "WS_PING_INTERVAL_SECS", 30),
                idle_timeout_secs: parse_or(&lookup, "WS_IDLE_TIMEOUT_SECS", 300),
                channel_capacity: parse_or(&lookup, "WS_CHANNEL_CAPACITY", 64),
                max_connections: parse_or(&lookup, "WS_MAX_CONNECTIONS", 1000),
            },
            auth: AuthConfig {
                principals_file: lookup("BUSLINE_PRINCIPALS_FILE").map(PathBuf::from),
            },
            store: StoreSettings {
                broadcast_capacity: parse_or(&lookup, "STORE_BROADCAST_CAPACITY", 1024),
                command_timeout_secs: parse_or(&lookup, "COMMAND_TIMEOUT_SECS", 5),
            },
        }
    }

    /// Address the HTTP server binds to
    #[must_use]
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Address the metrics listener binds to
    #[must_use]
    pub fn metrics_addr(&self) -> String {
        format!("{}:{}", self.server.metrics_host, self.server.metrics_port)
    }

    /// Graceful shutdown budget
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout)
    }
}

impl RealtimeConfig {
    /// Ping interval as a duration
    #[must_use]
    pub const fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// Idle timeout as a duration
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl StoreSettings {
    /// Command timeout as a duration
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
