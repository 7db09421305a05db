use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventStoreError, Result, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

/// PostgreSQL-backed event store.
///
/// Writers of one stream are serialized by a transaction-scoped advisory
/// lock keyed on the aggregate id, so the version check and the insert see
/// the same stream. The `unique_aggregate_version` constraint backs this up.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    event_type: String,
    aggregate_id: Uuid,
    aggregate_type: String,
    version: i64,
    timestamp: DateTime<Utc>,
    payload: serde_json::Value,
    metadata: serde_json::Value,
}

impl TryFrom<EventRow> for EventEnvelope {
    type Error = EventStoreError;

    fn try_from(row: EventRow) -> Result<Self> {
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(row.metadata)?;
        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.id),
            event_type: row.event_type,
            aggregate_id: AggregateId::from_uuid(row.aggregate_id),
            aggregate_type: row.aggregate_type,
            version: Version::new(row.version),
            timestamp: row.timestamp,
            payload: row.payload,
            metadata,
        })
    }
}

/// Advisory lock key for one stream.
fn lock_key(aggregate_id: AggregateId) -> i64 {
    aggregate_id.as_uuid().as_u64_pair().0 as i64
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id;
        let aggregate_type = events[0].aggregate_type.clone();
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(lock_key(aggregate_id))
            .execute(&mut *tx)
            .await?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&mut *tx)
                .await?;
        let current = current.map(Version::new).unwrap_or(Version::initial());

        options.check(aggregate_id, current)?;
        if events[0].version != current.next() {
            return Err(EventStoreError::conflict(
                aggregate_id,
                options.expected_version.unwrap_or(current),
                current,
            ));
        }

        let count = events.len();
        let mut ids = Vec::with_capacity(count);
        let mut event_types = Vec::with_capacity(count);
        let mut versions = Vec::with_capacity(count);
        let mut timestamps = Vec::with_capacity(count);
        let mut payloads = Vec::with_capacity(count);
        let mut metadata = Vec::with_capacity(count);
        for event in events {
            ids.push(event.event_id.as_uuid());
            event_types.push(event.event_type);
            versions.push(event.version.as_i64());
            timestamps.push(event.timestamp);
            payloads.push(event.payload);
            metadata.push(serde_json::to_value(event.metadata)?);
        }
        let last_version = Version::new(versions[count - 1]);

        sqlx::query(
            r#"
            INSERT INTO events (id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata)
            SELECT e.id, e.event_type, $7, $8, e.version, e.timestamp, e.payload, e.metadata
            FROM UNNEST($1::uuid[], $2::text[], $3::bigint[], $4::timestamptz[], $5::jsonb[], $6::jsonb[])
                AS e(id, event_type, version, timestamp, payload, metadata)
            "#,
        )
        .bind(ids)
        .bind(event_types)
        .bind(versions)
        .bind(timestamps)
        .bind(payloads)
        .bind(metadata)
        .bind(aggregate_id.as_uuid())
        .bind(&aggregate_type)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err)
                if db_err.constraint() == Some("unique_aggregate_version") =>
            {
                EventStoreError::conflict(
                    aggregate_id,
                    options.expected_version.unwrap_or(current),
                    current,
                )
            }
            other => EventStoreError::Database(other),
        })?;

        tx.commit().await?;
        metrics::counter!("event_store_appended_total").increment(count as u64);
        tracing::debug!(%aggregate_id, %aggregate_type, version = %last_version, "events appended");
        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata \
             FROM events WHERE aggregate_id = $1 ORDER BY version",
        )
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EventEnvelope::try_from).collect()
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }

    async fn load_streams(&self, aggregate_type: &str) -> Result<Vec<EventStream>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata \
             FROM events WHERE aggregate_type = $1 \
             ORDER BY MIN(timestamp) OVER (PARTITION BY aggregate_id), aggregate_id, version",
        )
        .bind(aggregate_type)
        .fetch_all(&self.pool)
        .await?;

        // Rows of one stream are contiguous.
        let mut streams: Vec<EventStream> = Vec::new();
        for row in rows {
            let event = EventEnvelope::try_from(row)?;
            match streams.last_mut() {
                Some(stream) if stream.aggregate_id == event.aggregate_id => {
                    stream.events.push(event)
                }
                _ => streams.push(EventStream {
                    aggregate_id: event.aggregate_id,
                    events: vec![event],
                }),
            }
        }
        Ok(streams)
    }
}
