//! Domain error types.

use event_store::EventStoreError;
use thiserror::Error;

use crate::address::AddressError;
use crate::cart::CartError;
use crate::fleet::FleetError;
use crate::order::OrderError;
use crate::route::{DriverClaimError, RouteError};
use crate::shipment::ShipmentError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Address error: {0}")]
    Address(#[from] AddressError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Shipment error: {0}")]
    Shipment(#[from] ShipmentError),

    #[error("Route error: {0}")]
    Route(#[from] RouteError),

    #[error("Driver claim error: {0}")]
    DriverClaim(#[from] DriverClaimError),

    #[error("Fleet error: {0}")]
    Fleet(#[from] FleetError),

    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// True when another writer changed the aggregate between load and append.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_conflict())
    }
}
