//! Shipment aggregate: delivery state machine, evidence and tracking history.

mod aggregate;
mod events;
mod state;
mod tracking;

pub use aggregate::{AssignmentRecord, AssignmentSource, Shipment};
pub use events::{
    DriverAssignedData, ShipmentClosedData, ShipmentCreatedData, ShipmentEvent,
    StatusChangedData,
};
pub use state::DeliveryStatus;
pub use tracking::{Evidence, GeoPoint, TrackingEntry};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShipmentError {
    #[error("Invalid state transition: cannot {action} a shipment in {current_status} state")]
    InvalidStateTransition {
        current_status: DeliveryStatus,
        action: &'static str,
    },

    #[error("Shipment already created")]
    AlreadyCreated,

    #[error("Shipment not found")]
    NotCreated,

    #[error("Invalid address: line1, city and country are required")]
    IncompleteAddress,

    #[error("Receiver name is required")]
    MissingReceiver,

    #[error("Invalid location: {0}")]
    InvalidLocation(&'static str),

    #[error("Unknown delivery status: {0}")]
    UnknownStatus(String),
}
