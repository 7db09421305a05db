use std::collections::BTreeMap;

use common::AggregateId;
use event_store::Version;

use crate::aggregate::Aggregate;
use crate::value_objects::UserId;

use super::{FleetError, FleetEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetDriver {
    pub driver_id: UserId,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetVehicle {
    pub vehicle_id: String,
    pub description: Option<String>,
    pub active: bool,
}

/// Drivers and vehicles known to the operation. A single stream; retired
/// entries stay listed but can no longer be assigned.
#[derive(Debug, Clone, Default)]
pub struct Fleet {
    id: Option<AggregateId>,
    version: Version,
    drivers: BTreeMap<UserId, FleetDriver>,
    vehicles: BTreeMap<String, FleetVehicle>,
}

impl Aggregate for Fleet {
    type Event = FleetEvent;
    type Error = FleetError;

    fn aggregate_type() -> &'static str {
        "Fleet"
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
        self.id = Some(Self::stream_id());
        match event {
            FleetEvent::DriverRegistered(data) => {
                self.drivers.insert(
                    data.driver_id,
                    FleetDriver {
                        driver_id: data.driver_id,
                        name: data.name,
                        active: true,
                    },
                );
            }
            FleetEvent::DriverRetired(data) => {
                if let Some(driver) = self.drivers.get_mut(&data.driver_id) {
                    driver.active = false;
                }
            }
            FleetEvent::VehicleRegistered(data) => {
                self.vehicles.insert(
                    data.vehicle_id.clone(),
                    FleetVehicle {
                        vehicle_id: data.vehicle_id,
                        description: data.description,
                        active: true,
                    },
                );
            }
            FleetEvent::VehicleRetired(data) => {
                if let Some(vehicle) = self.vehicles.get_mut(&data.vehicle_id) {
                    vehicle.active = false;
                }
            }
        }
    }
}

/// Vehicle ids are matched trimmed and upper-cased, so `van-1` and ` VAN-1 `
/// name the same vehicle.
fn normalize_vehicle_id(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

impl Fleet {
    pub fn stream_id() -> AggregateId {
        AggregateId::derived("fleet", "registry")
    }

    pub fn drivers(&self) -> impl Iterator<Item = &FleetDriver> {
        self.drivers.values()
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &FleetVehicle> {
        self.vehicles.values()
    }

    pub fn active_driver(&self, driver_id: UserId) -> Option<&FleetDriver> {
        self.drivers.get(&driver_id).filter(|d| d.active)
    }

    pub fn active_vehicle(&self, vehicle_id: &str) -> Option<&FleetVehicle> {
        self.vehicles
            .get(&normalize_vehicle_id(vehicle_id))
            .filter(|v| v.active)
    }

    /// Checks a driver and an optional vehicle can take an assignment.
    /// Returns the vehicle id in its registered form.
    pub fn check_assignable(
        &self,
        driver_id: UserId,
        vehicle_id: Option<&str>,
    ) -> Result<Option<String>, FleetError> {
        self.active_driver(driver_id)
            .ok_or(FleetError::UnknownDriver { driver_id })?;
        vehicle_id
            .map(|raw| {
                self.active_vehicle(raw)
                    .map(|v| v.vehicle_id.clone())
                    .ok_or_else(|| FleetError::UnknownVehicle {
                        vehicle_id: raw.trim().to_string(),
                    })
            })
            .transpose()
    }

    pub fn register_driver(&self, driver_id: UserId, name: &str) -> Result<Vec<FleetEvent>, FleetError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FleetError::MissingName);
        }
        if self.active_driver(driver_id).is_some_and(|d| d.name == name) {
            return Ok(vec![]);
        }
        Ok(vec![FleetEvent::driver_registered(driver_id, name.to_string())])
    }

    pub fn retire_driver(&self, driver_id: UserId) -> Result<Vec<FleetEvent>, FleetError> {
        let driver = self
            .drivers
            .get(&driver_id)
            .ok_or(FleetError::UnknownDriver { driver_id })?;
        if !driver.active {
            return Ok(vec![]);
        }
        Ok(vec![FleetEvent::driver_retired(driver_id)])
    }

    pub fn register_vehicle(
        &self,
        vehicle_id: &str,
        description: Option<String>,
    ) -> Result<Vec<FleetEvent>, FleetError> {
        let vehicle_id = normalize_vehicle_id(vehicle_id);
        if vehicle_id.is_empty() {
            return Err(FleetError::MissingVehicleId);
        }
        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if self
            .active_vehicle(&vehicle_id)
            .is_some_and(|v| v.description == description)
        {
            return Ok(vec![]);
        }
        Ok(vec![FleetEvent::vehicle_registered(vehicle_id, description)])
    }

    pub fn retire_vehicle(&self, vehicle_id: &str) -> Result<Vec<FleetEvent>, FleetError> {
        let key = normalize_vehicle_id(vehicle_id);
        let vehicle = self
            .vehicles
            .get(&key)
            .ok_or_else(|| FleetError::UnknownVehicle {
                vehicle_id: vehicle_id.trim().to_string(),
            })?;
        if !vehicle.active {
            return Ok(vec![]);
        }
        Ok(vec![FleetEvent::vehicle_retired(key)])
    }
}
