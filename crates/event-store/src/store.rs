use async_trait::async_trait;

use crate::{AggregateId, EventEnvelope, EventStoreError, Result, Version};

/// Options for appending events to the store.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Version the stream must be at for the append to go through.
    /// `None` skips the check.
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// The stream must not exist yet.
    pub fn expect_new() -> Self {
        Self::expect_version(Version::initial())
    }

    /// Fails with a conflict unless `current` is what the caller expected.
    pub(crate) fn check(&self, aggregate_id: AggregateId, current: Version) -> Result<()> {
        match self.expected_version {
            Some(expected) if expected != current => {
                Err(EventStoreError::conflict(aggregate_id, expected, current))
            }
            _ => Ok(()),
        }
    }
}

/// The events of one aggregate, in version order.
#[derive(Debug, Clone)]
pub struct EventStream {
    pub aggregate_id: AggregateId,
    pub events: Vec<EventEnvelope>,
}

impl EventStream {
    pub fn version(&self) -> Version {
        self.events
            .last()
            .map(|e| e.version)
            .unwrap_or(Version::initial())
    }
}

/// Persistence for aggregate event streams.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a batch of events for one aggregate.
    ///
    /// The batch is written atomically. When `options.expected_version` is
    /// set and the stream has moved on, nothing is written and
    /// [`EventStoreError::ConcurrencyConflict`] is returned. Without an
    /// expected version the batch must still continue the stream exactly.
    ///
    /// Returns the stream version after the append.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version>;

    /// All events of one aggregate in version order.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Current version of an aggregate, `None` if it has no events.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    /// Every stream of one aggregate type, e.g. every "Shipment", ordered by
    /// when the stream was started.
    async fn load_streams(&self, aggregate_type: &str) -> Result<Vec<EventStream>>;
}

/// Checks that a batch is non-empty, targets a single aggregate and carries
/// consecutive versions.
pub fn validate_events_for_append(events: &[EventEnvelope]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "cannot append an empty event list".to_string(),
        ));
    };

    let mut expected_version = first.version;
    for event in events.iter().skip(1) {
        if event.aggregate_id != first.aggregate_id || event.aggregate_type != first.aggregate_type
        {
            return Err(EventStoreError::InvalidAppend(
                "all events must belong to the same aggregate".to_string(),
            ));
        }
        expected_version = expected_version.next();
        if event.version != expected_version {
            return Err(EventStoreError::InvalidAppend(format!(
                "event versions must be sequential: expected {expected_version}, got {}",
                event.version
            )));
        }
    }

    Ok(())
}
