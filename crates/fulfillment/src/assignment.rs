//! Direct shipment-to-driver assignment.

use common::AggregateId;
use domain::{CommandHandler, Shipment, UserId};
use event_store::EventStore;

use crate::caller::Caller;
use crate::error::{FulfillmentError, Result};
use crate::fleet::FleetService;
use crate::views::ShipmentView;

/// Admin-only assignment outside of routes. Every assignment is kept in the
/// shipment's history; the latest one is the current driver. Driver and
/// vehicle must be registered in the fleet.
#[derive(Clone)]
pub struct AssignmentService<S: EventStore> {
    handler: CommandHandler<S, Shipment>,
    fleet: FleetService<S>,
}

impl<S: EventStore + Clone> AssignmentService<S> {
    pub fn new(store: S, fleet: FleetService<S>) -> Self {
        Self {
            handler: CommandHandler::new(store),
            fleet,
        }
    }

    #[tracing::instrument(skip(self), fields(caller = %caller.user_id, driver = %driver_id))]
    pub async fn assign(
        &self,
        caller: &Caller,
        shipment_id: AggregateId,
        driver_id: UserId,
        vehicle_id: Option<String>,
    ) -> Result<ShipmentView> {
        if !caller.is_admin {
            return Err(FulfillmentError::forbidden("only admins assign shipments"));
        }
        self.handler
            .load_existing(shipment_id)
            .await?
            .ok_or(FulfillmentError::NotFound("Shipment"))?;

        let vehicle_id = vehicle_id.filter(|v| !v.trim().is_empty());
        let vehicle_id = self
            .fleet
            .check_assignable(driver_id, vehicle_id.as_deref())
            .await?;
        let result = self
            .handler
            .execute_as(shipment_id, caller.actor(), |s| s.assign(driver_id, vehicle_id))
            .await?;

        metrics::counter!("shipment_assigned_total").increment(1);
        tracing::info!(%shipment_id, "shipment assigned");
        Ok(ShipmentView::new(shipment_id, &result.aggregate))
    }
}
