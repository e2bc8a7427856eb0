use std::collections::HashMap;
use std::sync::RwLock;

use splitfund_core::{ExpectedVersion, GroupId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// In-memory append-only event store.
///
/// The default backend, and the replay target of [`super::FileEventStore`].
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<GroupId, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    /// Append like [`EventStore::append`], calling `before_commit` with the
    /// numbered events while the write lock is held. If it fails, the stream
    /// is left untouched.
    pub(crate) fn append_with<F>(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
        before_commit: F,
    ) -> Result<Vec<StoredEvent>, EventStoreError>
    where
        F: FnOnce(&[StoredEvent]) -> Result<(), EventStoreError>,
    {
        if events.is_empty() {
            return Ok(vec![]);
        }

        // All events must target the same stream.
        let stream_id = events[0].stream_id.clone();
        let aggregate_type = events[0].aggregate_type.clone();

        for (idx, e) in events.iter().enumerate() {
            if e.stream_id != stream_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple stream ids (index {idx})"
                )));
            }
            if e.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        let current = streams
            .get(&stream_id)
            .map(|s| Self::current_version(s))
            .unwrap_or(0);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "stream '{stream_id}' expected {expected_version:?}, found {current}"
            )));
        }

        if let Some(existing) = streams.get(&stream_id).and_then(|s| s.first()) {
            if existing.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{}', attempted append with '{}'",
                    existing.aggregate_type, aggregate_type
                )));
            }
        }

        let committed: Vec<StoredEvent> = events
            .into_iter()
            .zip(current + 1..)
            .map(|(e, seq)| StoredEvent::commit(e, seq))
            .collect();

        before_commit(&committed)?;

        streams
            .entry(stream_id)
            .or_default()
            .extend(committed.iter().cloned());

        Ok(committed)
    }

    /// Put an already-numbered event back into its stream (journal replay).
    pub(crate) fn restore(&self, event: StoredEvent) -> Result<(), EventStoreError> {
        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        let stream = streams.entry(event.stream_id.clone()).or_default();
        let expected = Self::current_version(stream) + 1;
        if event.sequence_number != expected {
            return Err(EventStoreError::InvalidAppend(format!(
                "stream '{}' expected sequence {expected}, found {}",
                event.stream_id, event.sequence_number
            )));
        }
        stream.push(event);
        Ok(())
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.append_with(events, expected_version, |_| Ok(()))
    }

    fn load_stream(&self, stream_id: &GroupId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(streams.get(stream_id).cloned().unwrap_or_default())
    }

    fn stream_ids(&self) -> Result<Vec<GroupId>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        let mut ids: Vec<GroupId> = streams.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
