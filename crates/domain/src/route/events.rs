//! Delivery route events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::{Money, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RouteEvent {
    RouteCreated(RouteCreatedData),
    RouteTaken(RouteTakenData),
    RouteClosed(RouteClosedData),
}

impl DomainEvent for RouteEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RouteEvent::RouteCreated(_) => "RouteCreated",
            RouteEvent::RouteTaken(_) => "RouteTaken",
            RouteEvent::RouteClosed(_) => "RouteClosed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteCreatedData {
    pub route_id: AggregateId,
    pub name: String,
    pub description: Option<String>,
    pub order_ids: Vec<AggregateId>,
    /// Shipment created for each order, same position as `order_ids`.
    pub shipment_ids: Vec<AggregateId>,
    pub total_orders: u32,
    pub total_price: Money,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteTakenData {
    pub driver_id: UserId,
    pub taken_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteClosedData {
    pub closed_at: DateTime<Utc>,
}

impl RouteEvent {
    pub fn route_taken(driver_id: UserId) -> Self {
        RouteEvent::RouteTaken(RouteTakenData {
            driver_id,
            taken_at: Utc::now(),
        })
    }

    pub fn route_closed() -> Self {
        RouteEvent::RouteClosed(RouteClosedData {
            closed_at: Utc::now(),
        })
    }
}
