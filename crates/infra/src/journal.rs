//! Commit pipeline shared by the receiving ledger and the movement engine.
//!
//! ```text
//! decided events
//!   ↓
//! 1. serialize (JSON payloads)
//!   ↓
//! 2. check the batch against the inventory index (nothing is written yet)
//!   ↓
//! 3. append to the event store (per-stream sequence, global position, recorded_at)
//!   ↓
//! 4. fold into the inventory index (under its write lock)
//!   ↓
//! 5. publish envelopes on the bus (best effort)
//! ```
//!
//! All steps run under one commit mutex, so the index and the bus see
//! events in exactly the order the store committed them.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use uuid::Uuid;

use wms_core::ExpectedVersion;
use wms_events::{Event, EventBus, EventEnvelope, InMemoryEventBus};

use crate::error::{LedgerError, LedgerResult};
use crate::event_store::{EventStore, InMemoryEventStore, StoredEvent, UncommittedEvent};
use crate::projections::{InventoryIndex, SharedIndex};

/// Bus carrying committed envelopes with JSON payloads.
pub type EnvelopeBus = InMemoryEventBus<EventEnvelope<JsonValue>>;

#[derive(Debug)]
pub struct Journal<S = InMemoryEventStore, B = EnvelopeBus> {
    store: S,
    bus: B,
    index: SharedIndex,
    commit_lock: Mutex<()>,
}

impl Journal {
    /// Empty in-memory log with an in-process bus.
    pub fn in_memory() -> Self {
        Self {
            store: InMemoryEventStore::new(),
            bus: EnvelopeBus::new(),
            index: SharedIndex::default(),
            commit_lock: Mutex::new(()),
        }
    }
}

impl<S, B> Journal<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Open a journal over an existing log; the index is folded from it.
    pub fn open(store: S, bus: B) -> LedgerResult<Self> {
        let index = InventoryIndex::rebuild(store.load_all()?)?;
        Ok(Self {
            store,
            bus,
            index: SharedIndex::new(index),
            commit_lock: Mutex::new(()),
        })
    }

    /// Commit a batch of events to one stream.
    ///
    /// Nothing is visible until the append succeeds. Publication failure is
    /// logged and does not undo the commit.
    pub fn commit<E>(
        &self,
        stream_type: &str,
        stream_id: &str,
        expected_version: ExpectedVersion,
        events: &[E],
    ) -> LedgerResult<Vec<StoredEvent>>
    where
        E: Event + Serialize,
    {
        if events.is_empty() {
            return Ok(vec![]);
        }

        let uncommitted = events
            .iter()
            .map(|e| UncommittedEvent::from_typed(stream_type, stream_id, Uuid::now_v7(), e))
            .collect::<Result<Vec<_>, _>>()?;

        let _commit = self
            .commit_lock
            .lock()
            .map_err(|_| LedgerError::Poisoned("journal commit"))?;

        // The index must accept the batch before it reaches the log.
        self.index.read().check(&uncommitted)?;
        let committed = self.store.append(uncommitted, expected_version)?;
        self.index.apply_batch(&committed)?;

        for event in &committed {
            debug!(
                stream_type = %event.stream_type,
                stream_id = %event.stream_id,
                event_type = %event.event_type,
                position = event.position,
                "event committed"
            );
            if let Err(err) = self.bus.publish(event.to_envelope()) {
                warn!(position = event.position, error = ?err, "failed to publish committed event");
            }
        }

        Ok(committed)
    }

    /// Replace the live index with one folded from the full log.
    pub fn rebuild_index(&self) -> LedgerResult<()> {
        // Hold the commit lock so no commit lands between load and swap.
        let _commit = self
            .commit_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let rebuilt = InventoryIndex::rebuild(self.store.load_all()?)?;
        self.index.replace(rebuilt);
        Ok(())
    }

    /// Whether a rebuild from the log would equal the live index.
    pub fn verify_index(&self) -> LedgerResult<bool> {
        let _commit = self
            .commit_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let rebuilt = InventoryIndex::rebuild(self.store.load_all()?)?;
        Ok(rebuilt == *self.index.read())
    }

    pub fn stream_version(&self, stream_type: &str, stream_id: &str) -> LedgerResult<u64> {
        Ok(self.store.stream_version(stream_type, stream_id)?)
    }

    pub fn index(&self) -> &SharedIndex {
        &self.index
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}
