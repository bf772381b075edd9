//! Append-only event log boundary.
//!
//! Storage-agnostic: the ledger only needs atomic per-stream appends with a
//! global commit position, stream loads, and a full-log scan for rebuilds.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
