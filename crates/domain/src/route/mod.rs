//! Delivery routes and the per-driver claim that keeps a driver on one
//! active route at a time.

mod aggregate;
mod claim;
mod events;

pub use aggregate::DeliveryRoute;
pub use claim::{
    CLAIM_SETTLE_TIME, DriverClaim, DriverClaimEvent, RouteClaimedData, RouteReleasedData,
};
pub use events::{RouteClosedData, RouteCreatedData, RouteEvent, RouteTakenData};

use common::AggregateId;
use thiserror::Error;

use crate::value_objects::UserId;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Route name is required")]
    BlankName,

    #[error("Route needs at least one order")]
    NoOrders,

    #[error("Order {order_id} appears more than once")]
    DuplicateOrder { order_id: AggregateId },

    #[error("Route already created")]
    AlreadyCreated,

    #[error("Route not found")]
    NotCreated,

    #[error("Route is not active")]
    Inactive,

    #[error("Route already taken by driver {driver_id}")]
    AlreadyTaken { driver_id: UserId },
}

#[derive(Debug, Error)]
pub enum DriverClaimError {
    #[error("Driver already holds active route {route_id}")]
    HoldsAnotherRoute { route_id: AggregateId },
}
