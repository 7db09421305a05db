//! Fleet events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::UserId;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum FleetEvent {
    DriverRegistered(DriverRegisteredData),
    DriverRetired(DriverRetiredData),
    VehicleRegistered(VehicleRegisteredData),
    VehicleRetired(VehicleRetiredData),
}

impl DomainEvent for FleetEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FleetEvent::DriverRegistered(_) => "DriverRegistered",
            FleetEvent::DriverRetired(_) => "DriverRetired",
            FleetEvent::VehicleRegistered(_) => "VehicleRegistered",
            FleetEvent::VehicleRetired(_) => "VehicleRetired",
        }
    }
}

/// Registers a driver, or renames and reactivates a known one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverRegisteredData {
    pub driver_id: UserId,
    pub name: String,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverRetiredData {
    pub driver_id: UserId,
    pub retired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleRegisteredData {
    pub vehicle_id: String,
    pub description: Option<String>,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleRetiredData {
    pub vehicle_id: String,
    pub retired_at: DateTime<Utc>,
}

impl FleetEvent {
    pub fn driver_registered(driver_id: UserId, name: String) -> Self {
        FleetEvent::DriverRegistered(DriverRegisteredData {
            driver_id,
            name,
            registered_at: Utc::now(),
        })
    }

    pub fn driver_retired(driver_id: UserId) -> Self {
        FleetEvent::DriverRetired(DriverRetiredData {
            driver_id,
            retired_at: Utc::now(),
        })
    }

    pub fn vehicle_registered(vehicle_id: String, description: Option<String>) -> Self {
        FleetEvent::VehicleRegistered(VehicleRegisteredData {
            vehicle_id,
            description,
            registered_at: Utc::now(),
        })
    }

    pub fn vehicle_retired(vehicle_id: String) -> Self {
        FleetEvent::VehicleRetired(VehicleRetiredData {
            vehicle_id,
            retired_at: Utc::now(),
        })
    }
}
