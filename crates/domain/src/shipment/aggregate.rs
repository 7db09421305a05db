//! Shipment aggregate implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::value_objects::{Address, Money, UserId};

use super::events::ShipmentCreatedData;
use super::{DeliveryStatus, Evidence, GeoPoint, ShipmentError, ShipmentEvent, TrackingEntry};

/// Tracking note written when a courier starts a shipment.
pub const STARTED_NOTE: &str = "Picked up / started";
/// Tracking note written when a shipment is cancelled.
pub const CANCELLED_NOTE: &str = "Cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentSource {
    /// An admin assigned the shipment to a driver.
    Direct,
    /// A driver took the route the shipment belongs to.
    Route,
}

/// Audit entry of a direct assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub driver_id: UserId,
    pub vehicle_id: Option<String>,
    pub assigned_at: DateTime<Utc>,
}

/// Shipment aggregate root.
#[derive(Debug, Clone, Default)]
pub struct Shipment {
    id: Option<AggregateId>,
    version: Version,
    order_id: Option<AggregateId>,
    owner_id: Option<UserId>,
    address: Option<Address>,
    price: Money,
    route_id: Option<AggregateId>,
    status: DeliveryStatus,
    assigned_driver: Option<UserId>,
    assignments: Vec<AssignmentRecord>,
    evidence: Option<Evidence>,
    tracking: Vec<TrackingEntry>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Aggregate for Shipment {
    type Event = ShipmentEvent;
    type Error = ShipmentError;

    fn aggregate_type() -> &'static str {
        "Shipment"
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
            ShipmentEvent::ShipmentCreated(data) => {
                self.id = Some(data.shipment_id);
                self.order_id = Some(data.order_id);
                self.owner_id = Some(data.owner_id);
                self.address = Some(data.address);
                self.price = data.price;
                self.route_id = data.route_id;
                self.status = DeliveryStatus::PendingPickup;
                self.created_at = Some(data.created_at);
                self.updated_at = Some(data.created_at);
            }
            ShipmentEvent::DriverAssigned(data) => {
                self.assigned_driver = Some(data.driver_id);
                match data.source {
                    AssignmentSource::Direct => {
                        self.status = DeliveryStatus::Assigned;
                        self.assignments.push(AssignmentRecord {
                            driver_id: data.driver_id,
                            vehicle_id: data.vehicle_id,
                            assigned_at: data.assigned_at,
                        });
                    }
                    AssignmentSource::Route => {
                        if self.status == DeliveryStatus::PendingPickup {
                            self.status = DeliveryStatus::Assigned;
                        }
                    }
                }
                self.updated_at = Some(data.assigned_at);
            }
            ShipmentEvent::ShipmentStarted(data) => {
                self.status = DeliveryStatus::InTransit;
                self.updated_at = Some(data.at);
            }
            ShipmentEvent::ShipmentDelivered(data) => {
                self.status = DeliveryStatus::Delivered;
                self.evidence = Some(data.evidence);
                self.updated_at = Some(data.closed_at);
            }
            ShipmentEvent::ShipmentFailed(data) => {
                self.status = DeliveryStatus::Failed;
                self.evidence = Some(data.evidence);
                self.updated_at = Some(data.closed_at);
            }
            ShipmentEvent::ShipmentCancelled(data) => {
                self.status = DeliveryStatus::Cancelled;
                self.updated_at = Some(data.at);
            }
            ShipmentEvent::TrackingRecorded(entry) => {
                self.tracking.push(entry);
            }
        }
    }
}

// Query methods
impl Shipment {
    pub fn order_id(&self) -> Option<AggregateId> {
        self.order_id
    }

    pub fn owner_id(&self) -> Option<UserId> {
        self.owner_id
    }

    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn route_id(&self) -> Option<AggregateId> {
        self.route_id
    }

    pub fn status(&self) -> DeliveryStatus {
        self.status
    }

    pub fn assigned_driver(&self) -> Option<UserId> {
        self.assigned_driver
    }

    pub fn assignments(&self) -> &[AssignmentRecord] {
        &self.assignments
    }

    pub fn evidence(&self) -> Option<&Evidence> {
        self.evidence.as_ref()
    }

    /// Tracking history, oldest first.
    pub fn tracking(&self) -> &[TrackingEntry] {
        &self.tracking
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Admins, the order owner, the current driver and anyone who was ever
    /// directly assigned may see and act on a shipment.
    pub fn is_accessible_by(&self, user_id: UserId, is_admin: bool) -> bool {
        is_admin
            || self.owner_id == Some(user_id)
            || self.assigned_driver == Some(user_id)
            || self.assignments.iter().any(|a| a.driver_id == user_id)
    }

    /// Fails unless the shipment exists and is still open for `action`.
    pub fn ensure_open(&self, action: &'static str) -> Result<(), ShipmentError> {
        if self.id.is_none() {
            return Err(ShipmentError::NotCreated);
        }
        if self.status.is_terminal() {
            return Err(ShipmentError::InvalidStateTransition {
                current_status: self.status,
                action,
            });
        }
        Ok(())
    }
}

// Command methods (return events)
impl Shipment {
    pub fn create(
        &self,
        shipment_id: AggregateId,
        order_id: AggregateId,
        owner_id: UserId,
        address: Address,
        price: Money,
        route_id: Option<AggregateId>,
    ) -> Result<Vec<ShipmentEvent>, ShipmentError> {
        if self.id.is_some() {
            return Err(ShipmentError::AlreadyCreated);
        }
        if !address.is_deliverable() {
            return Err(ShipmentError::IncompleteAddress);
        }
        Ok(vec![ShipmentEvent::ShipmentCreated(ShipmentCreatedData {
            shipment_id,
            order_id,
            owner_id,
            address,
            price,
            route_id,
            created_at: Utc::now(),
        })])
    }

    /// Directly assigns a driver. Recorded in the assignment history.
    pub fn assign(
        &self,
        driver_id: UserId,
        vehicle_id: Option<String>,
    ) -> Result<Vec<ShipmentEvent>, ShipmentError> {
        self.ensure_open("assign")?;
        Ok(vec![ShipmentEvent::driver_assigned(
            driver_id,
            vehicle_id,
            AssignmentSource::Direct,
        )])
    }

    /// Hands the shipment to the driver who took its route. Only a shipment
    /// still waiting for pickup changes status.
    pub fn attach_route_driver(&self, driver_id: UserId) -> Result<Vec<ShipmentEvent>, ShipmentError> {
        if self.id.is_none() {
            return Err(ShipmentError::NotCreated);
        }
        if self.assigned_driver == Some(driver_id) && self.status != DeliveryStatus::PendingPickup {
            return Ok(vec![]);
        }
        Ok(vec![ShipmentEvent::driver_assigned(
            driver_id,
            None,
            AssignmentSource::Route,
        )])
    }

    pub fn start(&self) -> Result<Vec<ShipmentEvent>, ShipmentError> {
        self.ensure_open("start")?;
        Ok(vec![
            ShipmentEvent::started(),
            ShipmentEvent::TrackingRecorded(TrackingEntry::now(
                DeliveryStatus::InTransit,
                None,
                Some(STARTED_NOTE.to_string()),
            )),
        ])
    }

    /// Marks the shipment delivered. The receiver name is trimmed and must
    /// not be blank.
    pub fn deliver(
        &self,
        receiver_name: &str,
        evidence_url: String,
        note: Option<String>,
        location: Option<GeoPoint>,
    ) -> Result<Vec<ShipmentEvent>, ShipmentError> {
        self.ensure_open("deliver")?;
        let receiver_name = receiver_name.trim();
        if receiver_name.is_empty() {
            return Err(ShipmentError::MissingReceiver);
        }
        Ok(vec![
            ShipmentEvent::delivered(Evidence {
                url: evidence_url,
                receiver_name: Some(receiver_name.to_string()),
                note: note.clone(),
            }),
            ShipmentEvent::TrackingRecorded(TrackingEntry::now(
                DeliveryStatus::Delivered,
                location,
                note,
            )),
        ])
    }

    pub fn fail(
        &self,
        evidence_url: String,
        note: Option<String>,
        location: Option<GeoPoint>,
    ) -> Result<Vec<ShipmentEvent>, ShipmentError> {
        self.ensure_open("fail")?;
        Ok(vec![
            ShipmentEvent::failed(Evidence {
                url: evidence_url,
                receiver_name: None,
                note: note.clone(),
            }),
            ShipmentEvent::TrackingRecorded(TrackingEntry::now(
                DeliveryStatus::Failed,
                location,
                note,
            )),
        ])
    }

    /// Cancels the shipment. Already cancelled is a no-op; a completed
    /// shipment cannot be cancelled.
    pub fn cancel(&self) -> Result<Vec<ShipmentEvent>, ShipmentError> {
        if self.id.is_none() {
            return Err(ShipmentError::NotCreated);
        }
        if self.status == DeliveryStatus::Cancelled {
            return Ok(vec![]);
        }
        self.ensure_open("cancel")?;
        Ok(vec![
            ShipmentEvent::cancelled(),
            ShipmentEvent::TrackingRecorded(TrackingEntry::now(
                DeliveryStatus::Cancelled,
                None,
                Some(CANCELLED_NOTE.to_string()),
            )),
        ])
    }

    /// Appends a tracking entry without touching the status. The entry
    /// carries the current status unless one is given.
    pub fn track(
        &self,
        status: Option<DeliveryStatus>,
        location: Option<GeoPoint>,
        note: Option<String>,
    ) -> Result<Vec<ShipmentEvent>, ShipmentError> {
        if self.id.is_none() {
            return Err(ShipmentError::NotCreated);
        }
        Ok(vec![ShipmentEvent::TrackingRecorded(TrackingEntry::now(
            status.unwrap_or(self.status),
            location,
            note,
        ))])
    }
}
