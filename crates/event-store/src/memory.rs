use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

#[derive(Default)]
struct Streams {
    by_id: HashMap<AggregateId, StoredStream>,
    /// Stream ids in the order their first event was appended.
    started: Vec<AggregateId>,
}

struct StoredStream {
    aggregate_type: String,
    events: Vec<EventEnvelope>,
}

impl StoredStream {
    fn version(&self) -> Version {
        self.events
            .last()
            .map(|e| e.version)
            .unwrap_or(Version::initial())
    }
}

/// In-memory event store.
///
/// Behaves like the PostgreSQL store, including version conflicts, and is
/// what the service runs on when no database is configured. Appends hold
/// the write lock for the whole check-and-insert.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    streams: Arc<RwLock<Streams>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored events across every stream.
    pub async fn event_count(&self) -> usize {
        let streams = self.streams.read().await;
        streams.by_id.values().map(|s| s.events.len()).sum()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id;
        let mut streams = self.streams.write().await;
        let current = streams
            .by_id
            .get(&aggregate_id)
            .map(StoredStream::version)
            .unwrap_or(Version::initial());

        options.check(aggregate_id, current)?;

        // Same guarantee as the unique (aggregate_id, version) constraint.
        if events[0].version != current.next() {
            return Err(EventStoreError::conflict(
                aggregate_id,
                options.expected_version.unwrap_or(current),
                current,
            ));
        }

        let appended = events.len();
        let last_version = events[appended - 1].version;
        let Streams { by_id, started } = &mut *streams;
        let stream = by_id.entry(aggregate_id).or_insert_with(|| {
            started.push(aggregate_id);
            StoredStream {
                aggregate_type: events[0].aggregate_type.clone(),
                events: Vec::new(),
            }
        });
        stream.events.extend(events);

        metrics::counter!("event_store_appended_total").increment(appended as u64);
        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let streams = self.streams.read().await;
        Ok(streams
            .by_id
            .get(&aggregate_id)
            .map(|s| s.events.clone())
            .unwrap_or_default())
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let streams = self.streams.read().await;
        Ok(streams.by_id.get(&aggregate_id).map(StoredStream::version))
    }

    async fn load_streams(&self, aggregate_type: &str) -> Result<Vec<EventStream>> {
        let streams = self.streams.read().await;
        Ok(streams
            .started
            .iter()
            .filter_map(|id| streams.by_id.get(id).map(|s| (id, s)))
            .filter(|(_, s)| s.aggregate_type == aggregate_type)
            .map(|(id, s)| EventStream {
                aggregate_id: *id,
                events: s.events.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(aggregate_id: AggregateId, aggregate_type: &str, version: i64, event_type: &str) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type(aggregate_type)
            .event_type(event_type)
            .version(Version::new(version))
            .payload_raw(serde_json::json!({"test": true}))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn append_batch_and_read_back() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();

        let version = store
            .append(
                vec![
                    event(id, "Cart", 1, "CartOpened"),
                    event(id, "Cart", 2, "LineAdded"),
                    event(id, "Cart", 3, "LineAdded"),
                ],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();

        assert_eq!(version, Version::new(3));
        let events = store.get_events_for_aggregate(id).await.unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].event_type, "CartOpened");
    }

    #[tokio::test]
    async fn stale_expected_version_writes_nothing() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();

        store
            .append(vec![event(id, "DeliveryRoute", 1, "RouteCreated")], AppendOptions::expect_new())
            .await
            .unwrap();

        let result = store
            .append(vec![event(id, "DeliveryRoute", 1, "RouteCreated")], AppendOptions::expect_new())
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn unchecked_append_still_rejects_duplicate_versions() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();

        store
            .append(vec![event(id, "Cart", 1, "CartOpened")], AppendOptions::new())
            .await
            .unwrap();

        let result = store
            .append(vec![event(id, "Cart", 1, "LineAdded")], AppendOptions::new())
            .await;
        assert!(result.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn racing_takes_have_one_winner() {
        let store = InMemoryEventStore::new();
        let route = AggregateId::new();
        store
            .append(vec![event(route, "DeliveryRoute", 1, "RouteCreated")], AppendOptions::expect_new())
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append(
                        vec![event(route, "DeliveryRoute", 2, "RouteTaken")],
                        AppendOptions::expect_version(Version::first()),
                    )
                    .await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(store.get_aggregate_version(route).await.unwrap(), Some(Version::new(2)));
    }

    #[tokio::test]
    async fn invalid_batch_is_rejected() {
        let store = InMemoryEventStore::new();
        let result = store.append(Vec::new(), AppendOptions::new()).await;
        assert!(matches!(result, Err(EventStoreError::InvalidAppend(_))));
    }

    #[tokio::test]
    async fn load_streams_keeps_start_order_per_type() {
        let store = InMemoryEventStore::new();
        let first = AggregateId::new();
        let second = AggregateId::new();

        for id in [first, second] {
            store
                .append(vec![event(id, "Shipment", 1, "ShipmentCreated")], AppendOptions::expect_new())
                .await
                .unwrap();
        }
        store
            .append(vec![event(AggregateId::new(), "Cart", 1, "CartOpened")], AppendOptions::expect_new())
            .await
            .unwrap();
        store
            .append(
                vec![event(first, "Shipment", 2, "ShipmentStarted")],
                AppendOptions::expect_version(Version::first()),
            )
            .await
            .unwrap();

        let streams = store.load_streams("Shipment").await.unwrap();
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].aggregate_id, first);
        assert_eq!(streams[0].version(), Version::new(2));
        assert_eq!(streams[1].aggregate_id, second);
        assert!(store.load_streams("Order").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn version_of_unknown_stream_is_none() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();

        assert!(store.get_aggregate_version(id).await.unwrap().is_none());
        assert!(store.get_events_for_aggregate(id).await.unwrap().is_empty());
    }
}
