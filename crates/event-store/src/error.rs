use thiserror::Error;

use crate::{AggregateId, Version};

/// Errors raised by the event store backends.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// Another writer moved the stream past the version this append was
    /// built on. Nothing from the batch was written.
    #[error("stream {aggregate_id} is at version {actual}, append expected {expected}")]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// The batch handed to `append` is malformed (empty, mixed aggregates, gaps).
    #[error("invalid append: {0}")]
    InvalidAppend(String),

    /// An envelope was built without one of its required fields.
    #[error("incomplete event envelope: missing {0}")]
    IncompleteEnvelope(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventStoreError {
    /// Builds a conflict and counts it.
    pub(crate) fn conflict(aggregate_id: AggregateId, expected: Version, actual: Version) -> Self {
        metrics::counter!("event_store_conflicts_total").increment(1);
        tracing::debug!(%aggregate_id, %expected, %actual, "append lost a version race");
        Self::ConcurrencyConflict {
            aggregate_id,
            expected,
            actual,
        }
    }

    /// Returns true when the error is an optimistic concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
