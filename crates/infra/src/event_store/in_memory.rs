use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use wms_core::ExpectedVersion;

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    stream_type: String,
    stream_id: String,
}

#[derive(Debug, Default)]
struct Log {
    events: Vec<StoredEvent>,
    versions: HashMap<StreamKey, u64>,
}

/// In-memory append-only event log.
///
/// Durability is out of scope; the log lives as long as the process.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    log: RwLock<Log>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events in the log.
    pub fn len(&self) -> usize {
        self.log.read().map(|l| l.events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let Some(first) = events.first() else {
            return Ok(vec![]);
        };

        // All events of a batch must target the same stream.
        let key = StreamKey {
            stream_type: first.stream_type.clone(),
            stream_id: first.stream_id.clone(),
        };
        for (idx, e) in events.iter().enumerate() {
            if e.stream_type != key.stream_type || e.stream_id != key.stream_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch mixes streams (index {idx})"
                )));
            }
        }

        let mut log = self.log.write().map_err(|_| EventStoreError::Poisoned)?;

        let current = log.versions.get(&key).copied().unwrap_or(0);
        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "stream {}/{}: expected {expected_version:?}, found {current}",
                key.stream_type, key.stream_id
            )));
        }

        // Log time never runs backwards, even if the wall clock does.
        let mut recorded_at = Utc::now();
        if let Some(last) = log.events.last() {
            recorded_at = recorded_at.max(last.recorded_at);
        }

        let mut sequence = current;
        let mut position = log.events.len() as u64;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            sequence += 1;
            position += 1;
            committed.push(StoredEvent {
                event_id: e.event_id,
                stream_type: e.stream_type,
                stream_id: e.stream_id,
                sequence_number: sequence,
                position,
                recorded_at,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            });
        }

        log.events.extend(committed.iter().cloned());
        log.versions.insert(key, sequence);

        Ok(committed)
    }

    fn load_stream(
        &self,
        stream_type: &str,
        stream_id: &str,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let log = self.log.read().map_err(|_| EventStoreError::Poisoned)?;
        Ok(log
            .events
            .iter()
            .filter(|e| e.stream_type == stream_type && e.stream_id == stream_id)
            .cloned()
            .collect())
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let log = self.log.read().map_err(|_| EventStoreError::Poisoned)?;
        Ok(log.events.clone())
    }

    fn stream_version(&self, stream_type: &str, stream_id: &str) -> Result<u64, EventStoreError> {
        let log = self.log.read().map_err(|_| EventStoreError::Poisoned)?;
        let key = StreamKey {
            stream_type: stream_type.to_string(),
            stream_id: stream_id.to_string(),
        };
        Ok(log.versions.get(&key).copied().unwrap_or(0))
    }
}
