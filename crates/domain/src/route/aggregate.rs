//! Delivery route aggregate.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;

use crate::aggregate::Aggregate;
use crate::value_objects::{Money, UserId};

use super::{RouteCreatedData, RouteError, RouteEvent};

/// A named batch of shipments handed to one driver.
///
/// A route is active until closed and is unclaimed until a driver takes it.
/// Taking is a single append against the version the taker loaded, so of
/// two drivers racing for the same route exactly one succeeds.
#[derive(Debug, Clone, Default)]
pub struct DeliveryRoute {
    id: Option<AggregateId>,
    version: Version,
    name: String,
    description: Option<String>,
    order_ids: Vec<AggregateId>,
    shipment_ids: Vec<AggregateId>,
    total_orders: u32,
    total_price: Money,
    created_by: Option<UserId>,
    active: bool,
    assigned_driver: Option<UserId>,
    created_at: Option<DateTime<Utc>>,
    taken_at: Option<DateTime<Utc>>,
}

impl Aggregate for DeliveryRoute {
    type Event = RouteEvent;
    type Error = RouteError;

    fn aggregate_type() -> &'static str {
        "DeliveryRoute"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            RouteEvent::RouteCreated(data) => {
                self.id = Some(data.route_id);
                self.name = data.name;
                self.description = data.description;
                self.order_ids = data.order_ids;
                self.shipment_ids = data.shipment_ids;
                self.total_orders = data.total_orders;
                self.total_price = data.total_price;
                self.created_by = Some(data.created_by);
                self.active = true;
                self.created_at = Some(data.created_at);
            }
            RouteEvent::RouteTaken(data) => {
                self.assigned_driver = Some(data.driver_id);
                self.taken_at = Some(data.taken_at);
            }
            RouteEvent::RouteClosed(_) => {
                self.active = false;
            }
        }
    }
}

// Query methods
impl DeliveryRoute {
    /// Id of the shipment a route creates for one of its orders.
    pub fn shipment_id_for(route_id: AggregateId, order_id: AggregateId) -> AggregateId {
        AggregateId::derived("route-shipment", format!("{route_id}/{order_id}"))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn order_ids(&self) -> &[AggregateId] {
        &self.order_ids
    }

    pub fn shipment_ids(&self) -> &[AggregateId] {
        &self.shipment_ids
    }

    pub fn total_orders(&self) -> u32 {
        self.total_orders
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn assigned_driver(&self) -> Option<UserId> {
        self.assigned_driver
    }

    /// Active and not yet taken.
    pub fn is_available(&self) -> bool {
        self.active && self.assigned_driver.is_none()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn taken_at(&self) -> Option<DateTime<Utc>> {
        self.taken_at
    }

    /// Checks a route request before anything is looked up or written.
    pub fn validate_request(name: &str, order_ids: &[AggregateId]) -> Result<(), RouteError> {
        if name.trim().is_empty() {
            return Err(RouteError::BlankName);
        }
        if order_ids.is_empty() {
            return Err(RouteError::NoOrders);
        }
        let mut seen = HashSet::with_capacity(order_ids.len());
        for order_id in order_ids {
            if !seen.insert(*order_id) {
                return Err(RouteError::DuplicateOrder {
                    order_id: *order_id,
                });
            }
        }
        Ok(())
    }
}

// Command methods (return events)
impl DeliveryRoute {
    pub fn create(
        &self,
        route_id: AggregateId,
        name: &str,
        description: Option<String>,
        order_ids: Vec<AggregateId>,
        total_price: Money,
        created_by: UserId,
    ) -> Result<Vec<RouteEvent>, RouteError> {
        if self.id.is_some() {
            return Err(RouteError::AlreadyCreated);
        }
        Self::validate_request(name, &order_ids)?;

        let shipment_ids = order_ids
            .iter()
            .map(|order_id| Self::shipment_id_for(route_id, *order_id))
            .collect();

        Ok(vec![RouteEvent::RouteCreated(RouteCreatedData {
            route_id,
            name: name.trim().to_string(),
            description: description.filter(|d| !d.trim().is_empty()),
            total_orders: order_ids.len() as u32,
            order_ids,
            shipment_ids,
            total_price,
            created_by,
            created_at: Utc::now(),
        })])
    }

    /// Claims the route for `driver_id`. Taking it again as the same driver
    /// is a no-op, so an interrupted hand-over can be resumed.
    pub fn take(&self, driver_id: UserId) -> Result<Vec<RouteEvent>, RouteError> {
        if self.id.is_none() {
            return Err(RouteError::NotCreated);
        }
        if !self.active {
            return Err(RouteError::Inactive);
        }
        match self.assigned_driver {
            Some(current) if current == driver_id => return Ok(vec![]),
            Some(current) => return Err(RouteError::AlreadyTaken { driver_id: current }),
            None => {}
        }
        Ok(vec![RouteEvent::route_taken(driver_id)])
    }

    /// Deactivates the route. Closing a closed route is a no-op.
    pub fn close(&self) -> Result<Vec<RouteEvent>, RouteError> {
        if self.id.is_none() {
            return Err(RouteError::NotCreated);
        }
        if !self.active {
            return Ok(vec![]);
        }
        Ok(vec![RouteEvent::route_closed()])
    }
}
