//! Registry of the drivers and vehicles shipments can be assigned to.

mod aggregate;
mod events;

pub use aggregate::{Fleet, FleetDriver, FleetVehicle};
pub use events::{
    DriverRegisteredData, DriverRetiredData, FleetEvent, VehicleRegisteredData, VehicleRetiredData,
};

use thiserror::Error;

use crate::value_objects::UserId;

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("Driver {driver_id} is not registered")]
    UnknownDriver { driver_id: UserId },

    #[error("Vehicle {vehicle_id} is not registered")]
    UnknownVehicle { vehicle_id: String },

    #[error("Driver name is required")]
    MissingName,

    #[error("Vehicle id is required")]
    MissingVehicleId,
}
