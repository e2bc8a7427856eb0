//! Append-only event store boundary.
//!
//! One stream per group. Backends: an in-memory store and a JSON Lines
//! journal that replays into it on open.

pub mod file;
pub mod in_memory;
pub mod r#trait;

pub use file::FileEventStore;
pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
