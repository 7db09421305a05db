//! Admin registry of drivers and vehicles.

use domain::{CommandHandler, Fleet, FleetError, FleetEvent, UserId};
use event_store::EventStore;

use crate::caller::Caller;
use crate::error::{FulfillmentError, Result};
use crate::retry::execute_retrying;
use crate::settings::FulfillmentSettings;
use crate::views::FleetView;

#[derive(Clone)]
pub struct FleetService<S: EventStore> {
    handler: CommandHandler<S, Fleet>,
    write_attempts: u32,
}

impl<S: EventStore + Clone> FleetService<S> {
    pub fn new(store: S, settings: &FulfillmentSettings) -> Self {
        Self {
            handler: CommandHandler::new(store),
            write_attempts: settings.write_attempts,
        }
    }

    pub async fn get(&self, caller: &Caller) -> Result<FleetView> {
        Self::require_admin(caller)?;
        let fleet = self.handler.load(Fleet::stream_id()).await?;
        Ok(FleetView::from(&fleet))
    }

    /// Checks that a shipment may be assigned to this driver and vehicle.
    /// Returns the vehicle id as registered.
    pub async fn check_assignable(&self, driver_id: UserId, vehicle_id: Option<&str>) -> Result<Option<String>> {
        let fleet = self.handler.load(Fleet::stream_id()).await?;
        Ok(fleet.check_assignable(driver_id, vehicle_id)?)
    }

    #[tracing::instrument(skip(self), fields(caller = %caller.user_id))]
    pub async fn register_driver(&self, caller: &Caller, driver_id: UserId, name: &str) -> Result<FleetView> {
        self.write(caller, |fleet| fleet.register_driver(driver_id, name))
            .await
    }

    #[tracing::instrument(skip(self), fields(caller = %caller.user_id))]
    pub async fn retire_driver(&self, caller: &Caller, driver_id: UserId) -> Result<FleetView> {
        self.write(caller, |fleet| fleet.retire_driver(driver_id)).await
    }

    #[tracing::instrument(skip(self), fields(caller = %caller.user_id))]
    pub async fn register_vehicle(
        &self,
        caller: &Caller,
        vehicle_id: &str,
        description: Option<String>,
    ) -> Result<FleetView> {
        self.write(caller, |fleet| {
            fleet.register_vehicle(vehicle_id, description.clone())
        })
        .await
    }

    #[tracing::instrument(skip(self), fields(caller = %caller.user_id))]
    pub async fn retire_vehicle(&self, caller: &Caller, vehicle_id: &str) -> Result<FleetView> {
        self.write(caller, |fleet| fleet.retire_vehicle(vehicle_id)).await
    }

    async fn write<F>(&self, caller: &Caller, command: F) -> Result<FleetView>
    where
        F: Fn(&Fleet) -> std::result::Result<Vec<FleetEvent>, FleetError>,
    {
        Self::require_admin(caller)?;
        let result = execute_retrying(
            &self.handler,
            Fleet::stream_id(),
            caller.actor(),
            self.write_attempts,
            command,
        )
        .await?;
        if !result.events.is_empty() {
            metrics::counter!("fleet_changes_total").increment(result.events.len() as u64);
            tracing::info!(changes = result.events.len(), "fleet updated");
        }
        Ok(FleetView::from(&result.aggregate))
    }

    fn require_admin(caller: &Caller) -> Result<()> {
        if !caller.is_admin {
            return Err(FulfillmentError::forbidden("only admins manage the fleet"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use event_store::InMemoryEventStore;

    fn service() -> FleetService<InMemoryEventStore> {
        FleetService::new(InMemoryEventStore::new(), &FulfillmentSettings::default())
    }

    #[tokio::test]
    async fn admins_register_and_retire() {
        let fleet = service();
        let admin = Caller::admin(1);

        fleet.register_driver(&admin, UserId::new(20), "Rosa").await.unwrap();
        let view = fleet
            .register_vehicle(&admin, "van-1", Some("Sprinter".into()))
            .await
            .unwrap();
        assert_eq!(view.drivers.len(), 1);
        assert_eq!(view.vehicles[0].vehicle_id, "VAN-1");

        assert_eq!(
            fleet.check_assignable(UserId::new(20), Some("Van-1")).await.unwrap(),
            Some("VAN-1".to_string())
        );

        let view = fleet.retire_vehicle(&admin, "VAN-1").await.unwrap();
        assert!(!view.vehicles[0].active);
        let err = fleet
            .check_assignable(UserId::new(20), Some("VAN-1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn only_admins_touch_the_fleet() {
        let fleet = service();
        let err = fleet
            .register_driver(&Caller::user(20), UserId::new(20), "Rosa")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(fleet.get(&Caller::user(20)).await.unwrap_err().kind(), ErrorKind::Forbidden);
        assert!(fleet.get(&Caller::admin(1)).await.unwrap().drivers.is_empty());
    }

    #[tokio::test]
    async fn retiring_an_unknown_driver_is_not_found() {
        let err = service()
            .retire_driver(&Caller::admin(1), UserId::new(99))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
