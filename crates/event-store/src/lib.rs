//! Append-only event persistence for the fulfillment aggregates.
//!
//! Every aggregate is one stream of [`EventEnvelope`]s. Appends carry an
//! optional expected version, which is the compare-and-swap the services
//! rely on wherever only one writer may win.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{AppendOptions, EventStore, EventStream, validate_events_for_append};
