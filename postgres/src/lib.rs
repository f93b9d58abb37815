//! `PostgreSQL` event journal for Busline.
//!
//! Implements [`EventStore`] on a single `events` table keyed by
//! `(stream_id, version)`. The primary key is what turns a double write of
//! the same slot into [`EventStoreError::ConcurrencyConflict`].
//!
//! # Example
//!
//! ```ignore
//! use busline_postgres::PostgresEventStore;
//!
//! let journal = PostgresEventStore::connect("postgres://localhost/busline", 10, Duration::from_secs(5)).await?;
//! journal.migrate().await?;
//! ```

use busline_core::event::SerializedEvent;
use busline_core::event_store::{EventStore, EventStoreError, StoreFuture};
use busline_core::stream::{StreamId, Version};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::{Duration, Instant};

const SCHEMA: &str = include_str!("../migrations/0001_events.sql");

/// Postgres error code for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// Journal backed by a `PostgreSQL` connection pool.
#[derive(Clone, Debug)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Connect a new pool.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::DatabaseError`] if the database is unreachable.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, EventStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

        tracing::info!(max_connections, "Connected to journal database");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the journal schema if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::DatabaseError`] if the DDL fails.
    pub async fn migrate(&self) -> Result<(), EventStoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// Check that the database answers.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::DatabaseError`] if the probe query fails.
    pub async fn ping(&self) -> Result<(), EventStoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

fn to_db_version(version: Version) -> Result<i64, EventStoreError> {
    i64::try_from(version.value())
        .map_err(|_| EventStoreError::DatabaseError(format!("version {version} out of range")))
}

fn from_db_version(version: i64) -> Result<Version, EventStoreError> {
    u64::try_from(version)
        .map(Version::new)
        .map_err(|_| EventStoreError::DatabaseError(format!("negative version {version}")))
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .and_then(|e| e.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

impl EventStore for PostgresEventStore {
    fn append_events(
        &self,
        stream_id: StreamId,
        after: Version,
        events: Vec<SerializedEvent>,
    ) -> StoreFuture<'_, Version> {
        Box::pin(async move {
            let start = Instant::now();
            let count = events.len();

            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

            let mut version = after;
            for event in events {
                version = version.next();
                let result = sqlx::query(
                    r"
                    INSERT INTO events (stream_id, version, event_type, event_data, metadata)
                    VALUES ($1, $2, $3, $4, $5)
                    ",
                )
                .bind(stream_id.as_str())
                .bind(to_db_version(version)?)
                .bind(&event.event_type)
                .bind(&event.data)
                .bind(&event.metadata)
                .execute(&mut *tx)
                .await;

                if let Err(error) = result {
                    if is_unique_violation(&error) {
                        return Err(EventStoreError::ConcurrencyConflict {
                            stream_id,
                            version,
                        });
                    }
                    return Err(EventStoreError::DatabaseError(error.to_string()));
                }
            }

            tx.commit()
                .await
                .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

            tracing::debug!(
                stream_id = %stream_id,
                last_version = %version,
                count,
                elapsed_ms = start.elapsed().as_millis(),
                "Appended events"
            );
            Ok(version)
        })
    }

    fn load_events(
        &self,
        stream_id: StreamId,
        from_version: Option<Version>,
    ) -> StoreFuture<'_, Vec<(Version, SerializedEvent)>> {
        Box::pin(async move {
            let from = to_db_version(from_version.unwrap_or(Version::INITIAL))?;

            let rows = sqlx::query(
                r"
                SELECT version, event_type, event_data, metadata
                FROM events
                WHERE stream_id = $1 AND version >= $2
                ORDER BY version ASC
                ",
            )
            .bind(stream_id.as_str())
            .bind(from)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

            rows.iter()
                .map(|row| {
                    let version: i64 = row
                        .try_get("version")
                        .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;
                    let event = SerializedEvent::new(
                        row.try_get("event_type")
                            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?,
                        row.try_get("event_data")
                            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?,
                        row.try_get("metadata")
                            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?,
                    );
                    Ok((from_db_version(version)?, event))
                })
                .collect()
        })
    }

    fn current_version(&self, stream_id: StreamId) -> StoreFuture<'_, Version> {
        Box::pin(async move {
            let max: Option<i64> =
                sqlx::query_scalar("SELECT MAX(version) FROM events WHERE stream_id = $1")
                    .bind(stream_id.as_str())
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;

            max.map_or(Ok(Version::INITIAL), from_db_version)
        })
    }
}
