//! Shipment domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::{Address, Money, UserId};

use super::{AssignmentSource, Evidence, TrackingEntry};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ShipmentEvent {
    ShipmentCreated(ShipmentCreatedData),
    DriverAssigned(DriverAssignedData),
    ShipmentStarted(StatusChangedData),
    ShipmentDelivered(ShipmentClosedData),
    ShipmentFailed(ShipmentClosedData),
    ShipmentCancelled(StatusChangedData),
    /// Tracking history entry; never changes the stored status.
    TrackingRecorded(TrackingEntry),
}

impl DomainEvent for ShipmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ShipmentEvent::ShipmentCreated(_) => "ShipmentCreated",
            ShipmentEvent::DriverAssigned(_) => "DriverAssigned",
            ShipmentEvent::ShipmentStarted(_) => "ShipmentStarted",
            ShipmentEvent::ShipmentDelivered(_) => "ShipmentDelivered",
            ShipmentEvent::ShipmentFailed(_) => "ShipmentFailed",
            ShipmentEvent::ShipmentCancelled(_) => "ShipmentCancelled",
            ShipmentEvent::TrackingRecorded(_) => "TrackingRecorded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentCreatedData {
    pub shipment_id: AggregateId,
    pub order_id: AggregateId,
    /// Owner of the order.
    pub owner_id: UserId,
    pub address: Address,
    pub price: Money,
    pub route_id: Option<AggregateId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverAssignedData {
    pub driver_id: UserId,
    pub vehicle_id: Option<String>,
    pub source: AssignmentSource,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangedData {
    pub at: DateTime<Utc>,
}

/// Delivered or failed, with the evidence that proves it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentClosedData {
    pub evidence: Evidence,
    pub closed_at: DateTime<Utc>,
}

impl ShipmentEvent {
    pub fn driver_assigned(
        driver_id: UserId,
        vehicle_id: Option<String>,
        source: AssignmentSource,
    ) -> Self {
        ShipmentEvent::DriverAssigned(DriverAssignedData {
            driver_id,
            vehicle_id,
            source,
            assigned_at: Utc::now(),
        })
    }

    pub fn started() -> Self {
        ShipmentEvent::ShipmentStarted(StatusChangedData { at: Utc::now() })
    }

    pub fn delivered(evidence: Evidence) -> Self {
        ShipmentEvent::ShipmentDelivered(ShipmentClosedData {
            evidence,
            closed_at: Utc::now(),
        })
    }

    pub fn failed(evidence: Evidence) -> Self {
        ShipmentEvent::ShipmentFailed(ShipmentClosedData {
            evidence,
            closed_at: Utc::now(),
        })
    }

    pub fn cancelled() -> Self {
        ShipmentEvent::ShipmentCancelled(StatusChangedData { at: Utc::now() })
    }
}
