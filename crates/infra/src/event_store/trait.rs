use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use wms_core::ExpectedVersion;
use std::sync::Arc;

/// An event ready to be appended to a stream (no sequence number or position yet).
///
/// Use [`UncommittedEvent::from_typed`] to build one from a typed domain event:
/// the payload is serialized to JSON and the event metadata (type, schema
/// version, business time) is captured alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub stream_type: String,
    pub stream_id: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// An event committed to the log.
///
/// - `sequence_number`: position inside its stream, starting at 1.
/// - `position`: global commit position, starting at 1, gap-free.
/// - `recorded_at`: log time assigned at append; never decreases along `position`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub stream_type: String,
    pub stream_id: String,

    pub sequence_number: u64,
    pub position: u64,
    pub recorded_at: DateTime<Utc>,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    /// Convert into an envelope for publication on the bus.
    pub fn to_envelope(&self) -> wms_events::EventEnvelope<JsonValue> {
        wms_events::EventEnvelope::new(
            self.event_id,
            self.stream_type.clone(),
            self.stream_id.clone(),
            self.sequence_number,
            self.position,
            self.occurred_at,
            self.payload.clone(),
        )
    }
}

/// Event store operation error.
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("payload serialization failed: {0}")]
    Serialization(String),

    #[error("event store lock poisoned")]
    Poisoned,
}

/// Append-only event log, organised in streams (one per voucher / container).
///
/// Implementations must:
/// - append a batch atomically (all events or none)
/// - check `expected_version` against the current stream version
/// - assign stream sequence numbers and global positions without gaps
pub trait EventStore: Send + Sync {
    /// Append a batch of events to a single stream.
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load one stream in sequence order (empty if it was never written).
    fn load_stream(
        &self,
        stream_type: &str,
        stream_id: &str,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load the whole log in position order.
    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Current version (last sequence number) of a stream; 0 if never written.
    fn stream_version(&self, stream_type: &str, stream_id: &str) -> Result<u64, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(
        &self,
        stream_type: &str,
        stream_id: &str,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(stream_type, stream_id)
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_all()
    }

    fn stream_version(&self, stream_type: &str, stream_id: &str) -> Result<u64, EventStoreError> {
        (**self).stream_version(stream_type, stream_id)
    }
}

impl UncommittedEvent {
    /// Build from a typed domain event.
    pub fn from_typed<E>(
        stream_type: impl Into<String>,
        stream_id: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: wms_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event)
            .map_err(|e| EventStoreError::Serialization(e.to_string()))?;

        Ok(Self {
            event_id,
            stream_type: stream_type.into(),
            stream_id: stream_id.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
