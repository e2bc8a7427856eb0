//! Command execution pipeline (application-level orchestration).
//!
//! ```text
//! Command
//!   ↓
//! 1. Take the group's lock
//!   ↓
//! 2. Load the group stream and rehydrate the aggregate
//!   ↓
//! 3. Handle the command (pure decision, produces events)
//!   ↓
//! 4. Append with an exact expected version
//!   ↓
//! 5. Publish committed events to the sink (read models)
//! ```
//!
//! Commands for one group run one at a time; commands for different groups
//! do not block each other. The expected-version check at append time still
//! guards against writers that bypass the dispatcher.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use splitfund_core::{Aggregate, DomainError, Event, ExpectedVersion, GroupId};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Domain rejection (validation, missing group/member, conflict, invariant).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Persisting to or loading from the event store failed.
    #[error("event store failure: {0}")]
    Store(EventStoreError),

    /// A historical event payload could not be decoded.
    #[error("failed to decode stored event: {0}")]
    Deserialize(String),

    /// A read model rejected a committed event. The events are persisted.
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Domain(DomainError::Conflict(msg)),
            other => DispatchError::Store(other),
        }
    }
}

/// Receiver of committed events, called synchronously after each append.
pub trait EventSink: Send + Sync {
    type Error: core::fmt::Debug;

    fn publish(&self, event: &StoredEvent) -> Result<(), Self::Error>;
}

impl EventSink for () {
    type Error = Infallible;

    fn publish(&self, _event: &StoredEvent) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl<T> EventSink for Arc<T>
where
    T: EventSink + ?Sized,
{
    type Error = T::Error;

    fn publish(&self, event: &StoredEvent) -> Result<(), Self::Error> {
        (**self).publish(event)
    }
}

/// Result of a successful dispatch.
#[derive(Debug)]
pub struct Dispatched<A: Aggregate> {
    /// Aggregate state after the new events.
    pub aggregate: A,
    /// The events the command produced.
    pub events: Vec<A::Event>,
    /// The same events as stored, with sequence numbers.
    pub committed: Vec<StoredEvent>,
}

/// Command execution engine for the group streams.
///
/// - `S`: event store backend
/// - `B`: sink notified of committed events
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    sink: B,
    locks: Mutex<HashMap<GroupId, Arc<Mutex<()>>>>,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, sink: B) -> Self {
        Self {
            store,
            sink,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn group_lock(&self, group_id: &GroupId) -> Arc<Mutex<()>> {
        // The maps only guard lock handles, so a poisoned lock is still usable.
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(group_id.clone()).or_default().clone()
    }

    /// Hand back a group lock; the entry goes once no caller holds or waits on it.
    ///
    /// Handles are only cloned and dropped under the map lock, so a count of
    /// one means the map owns the last handle.
    fn release_group_lock(&self, group_id: &GroupId, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        drop(lock);
        if locks.get(group_id).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(group_id);
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventSink,
{
    /// Run a command against one group stream.
    ///
    /// Returns the rehydrated aggregate with the new events applied. A domain
    /// rejection appends nothing.
    pub fn dispatch<A>(
        &self,
        group_id: &GroupId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(GroupId) -> A,
    ) -> Result<Dispatched<A>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        let lock = self.group_lock(group_id);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.dispatch_locked(group_id, aggregate_type, command, make_aggregate)
        };
        self.release_group_lock(group_id, lock);
        result
    }

    fn dispatch_locked<A>(
        &self,
        group_id: &GroupId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(GroupId) -> A,
    ) -> Result<Dispatched<A>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        // 1) Load and rehydrate
        let history = self.store.load_stream(group_id)?;
        validate_loaded_stream(group_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        let mut aggregate = make_aggregate(group_id.clone());
        apply_history(&mut aggregate, &history)?;

        // 2) Decide
        let decided = match aggregate.handle(&command) {
            Ok(events) => events,
            Err(err) => {
                tracing::debug!(group_id = %group_id, error = %err, "command rejected");
                return Err(err.into());
            }
        };
        if decided.is_empty() {
            return Ok(Dispatched {
                aggregate,
                events: vec![],
                committed: vec![],
            });
        }

        // 3) Persist
        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(group_id.clone(), aggregate_type, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected).map_err(|err| {
            tracing::warn!(group_id = %group_id, error = %err, "append failed");
            DispatchError::from(err)
        })?;

        for ev in &decided {
            aggregate.apply(ev);
        }
        tracing::debug!(
            group_id = %group_id,
            version = stream_version(&committed),
            events = committed.len(),
            "events committed"
        );

        // 4) Publish (after append)
        for stored in &committed {
            self.sink
                .publish(stored)
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(Dispatched {
            aggregate,
            events: decided,
            committed,
        })
    }

    /// Rehydrate a group from its stream without running a command.
    ///
    /// Reads see whole appends only, so an expense is never half applied.
    pub fn load<A>(&self, group_id: &GroupId, make_aggregate: impl FnOnce(GroupId) -> A) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(group_id)?;
        validate_loaded_stream(group_id, &history)?;

        let mut aggregate = make_aggregate(group_id.clone());
        apply_history(&mut aggregate, &history)?;
        Ok(aggregate)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(group_id: &GroupId, stream: &[StoredEvent]) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if &e.stream_id != group_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong stream id at index {idx}"
            ))));
        }
        if e.sequence_number != last + 1 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "gap or reorder in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(format!("{} #{}: {e}", stored.event_type, stored.sequence_number)))?;
        aggregate.apply(&ev);
    }

    Ok(())
}
