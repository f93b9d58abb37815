//! In-memory event journal.

use busline_core::event::SerializedEvent;
use busline_core::event_store::{EventStore, EventStoreError, StoreFuture};
use busline_core::stream::{StreamId, Version};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Streams = HashMap<StreamId, BTreeMap<Version, SerializedEvent>>;

/// `HashMap`-backed journal with the same slot semantics as the Postgres
/// journal.
///
/// [`InMemoryEventStore::fail_next_appends`] makes the next appends fail
/// with a `DatabaseError`, for exercising persistence-failure paths.
#[derive(Clone, Debug, Default)]
pub struct InMemoryEventStore {
    streams: Arc<Mutex<Streams>>,
    failures: Arc<Mutex<usize>>,
}

impl InMemoryEventStore {
    /// Create an empty journal
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` appends
    pub fn fail_next_appends(&self, count: usize) {
        *self.failures.lock().unwrap_or_else(PoisonError::into_inner) = count;
    }

    /// Number of events stored in `stream_id`
    #[must_use]
    pub fn len(&self, stream_id: &StreamId) -> usize {
        self.streams().get(stream_id).map_or(0, BTreeMap::len)
    }

    /// Event type names in version order
    #[must_use]
    pub fn event_types(&self, stream_id: &StreamId) -> Vec<String> {
        self.streams()
            .get(stream_id)
            .map(|events| events.values().map(|e| e.event_type.clone()).collect())
            .unwrap_or_default()
    }

    fn streams(&self) -> MutexGuard<'_, Streams> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_failure(&self) -> bool {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        if *failures > 0 {
            *failures -= 1;
            true
        } else {
            false
        }
    }
}

impl EventStore for InMemoryEventStore {
    fn append_events(
        &self,
        stream_id: StreamId,
        after: Version,
        events: Vec<SerializedEvent>,
    ) -> StoreFuture<'_, Version> {
        Box::pin(async move {
            if self.take_failure() {
                return Err(EventStoreError::DatabaseError(
                    "injected append failure".to_string(),
                ));
            }

            let mut streams = self.streams();
            let stream = streams.entry(stream_id.clone()).or_default();

            let slots: Vec<Version> = (1..=events.len() as u64).map(|i| after.advance(i)).collect();
            if let Some(taken) = slots.iter().find(|v| stream.contains_key(v)) {
                return Err(EventStoreError::ConcurrencyConflict {
                    stream_id,
                    version: *taken,
                });
            }

            let mut last = after;
            for (version, event) in slots.into_iter().zip(events) {
                stream.insert(version, event);
                last = version;
            }
            Ok(last)
        })
    }

    fn load_events(
        &self,
        stream_id: StreamId,
        from_version: Option<Version>,
    ) -> StoreFuture<'_, Vec<(Version, SerializedEvent)>> {
        Box::pin(async move {
            let from = from_version.unwrap_or(Version::INITIAL);
            Ok(self
                .streams()
                .get(&stream_id)
                .map(|events| {
                    events
                        .range(from..)
                        .map(|(v, e)| (*v, e.clone()))
                        .collect()
                })
                .unwrap_or_default())
        })
    }

    fn current_version(&self, stream_id: StreamId) -> StoreFuture<'_, Version> {
        Box::pin(async move {
            Ok(self
                .streams()
                .get(&stream_id)
                .and_then(|events| events.keys().next_back().copied())
                .unwrap_or(Version::INITIAL))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str) -> SerializedEvent {
        SerializedEvent::new(name.to_string(), vec![1], None)
    }

    #[tokio::test]
    async fn out_of_order_appends_load_in_version_order() -> Result<(), EventStoreError> {
        let journal = InMemoryEventStore::new();
        let fleet = StreamId::fleet();

        journal
            .append_events(fleet.clone(), Version::new(2), vec![event("C")])
            .await?;
        journal
            .append_events(fleet.clone(), Version::INITIAL, vec![event("A"), event("B")])
            .await?;

        let loaded = journal.load_events(fleet.clone(), None).await?;
        let names: Vec<_> = loaded.iter().map(|(_, e)| e.event_type.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
        assert_eq!(journal.current_version(fleet).await?, Version::new(3));
        Ok(())
    }

    #[tokio::test]
    async fn taken_slot_is_a_conflict() -> Result<(), EventStoreError> {
        let journal = InMemoryEventStore::new();
        let fleet = StreamId::fleet();

        journal
            .append_events(fleet.clone(), Version::INITIAL, vec![event("A")])
            .await?;
        let result = journal
            .append_events(fleet.clone(), Version::INITIAL, vec![event("B")])
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { version, .. }) if version == Version::new(1)
        ));
        assert_eq!(journal.len(&fleet), 1);
        Ok(())
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() -> Result<(), EventStoreError> {
        let journal = InMemoryEventStore::new();
        let fleet = StreamId::fleet();
        journal.fail_next_appends(1);

        let first = journal
            .append_events(fleet.clone(), Version::INITIAL, vec![event("A")])
            .await;
        assert!(matches!(first, Err(EventStoreError::DatabaseError(_))));

        journal
            .append_events(fleet.clone(), Version::INITIAL, vec![event("A")])
            .await?;
        assert_eq!(journal.event_types(&fleet), ["A"]);
        Ok(())
    }
}
