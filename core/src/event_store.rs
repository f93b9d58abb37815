//! Event journal abstraction.
//!
//! The journal is the durable record of fleet state. Writers reserve version
//! slots up front (the reducer assigns them while it holds the state lock),
//! so appends issued from concurrent effect tasks may reach the journal out
//! of order without losing commit order: readers always get events sorted by
//! version.
//!
//! # Implementations
//!
//! - `PostgresEventStore` (in `busline-postgres`): production journal
//! - `InMemoryEventStore` (in `busline-testing`): fast, deterministic tests

use crate::event::SerializedEvent;
use crate::stream::{StreamId, Version};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`EventStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, EventStoreError>> + Send + 'a>>;

/// Errors that can occur during journal operations.
#[derive(Error, Debug)]
pub enum EventStoreError {
    /// A version slot the writer reserved is already occupied.
    #[error("Concurrency conflict on {stream_id}: version {version} already written")]
    ConcurrencyConflict {
        /// The stream ID where the conflict occurred.
        stream_id: StreamId,
        /// The occupied version.
        version: Version,
    },

    /// Database connection or query error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Durable, append-only storage for event streams.
///
/// # Dyn Compatibility
///
/// Methods return boxed futures instead of using `async fn` so that the
/// journal can be held as `Arc<dyn EventStore>` inside the reducer
/// environment and captured by effects.
pub trait EventStore: Send + Sync {
    /// Write `events` into consecutive version slots starting right after
    /// `after`.
    ///
    /// The first event lands at `after + 1`, the second at `after + 2`, and
    /// so on. The write is all-or-nothing.
    ///
    /// # Returns
    ///
    /// The version of the last event written.
    ///
    /// # Errors
    ///
    /// - `ConcurrencyConflict`: one of the slots is already taken
    /// - `DatabaseError`: the write failed
    fn append_events(
        &self,
        stream_id: StreamId,
        after: Version,
        events: Vec<SerializedEvent>,
    ) -> StoreFuture<'_, Version>;

    /// Load events from a stream, ordered by version.
    ///
    /// `from_version` is inclusive; `None` loads the whole stream. A stream
    /// that was never written returns an empty vector.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: the read failed
    fn load_events(
        &self,
        stream_id: StreamId,
        from_version: Option<Version>,
    ) -> StoreFuture<'_, Vec<(Version, SerializedEvent)>>;

    /// Highest version written to the stream, or `Version::INITIAL`.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: the read failed
    fn current_version(&self, stream_id: StreamId) -> StoreFuture<'_, Version>;
}
