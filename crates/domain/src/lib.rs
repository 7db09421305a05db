//! Domain layer for the fulfillment pipeline.
//!
//! Every piece of durable state is an event-sourced aggregate:
//! - [`Cart`]: one per user, lines keyed by variant
//! - [`AddressBook`]: one per user, at most one default address
//! - [`Order`]: placed once from a cart, then paid, cancelled or shipped
//! - [`Shipment`]: delivery state machine with evidence and tracking history
//! - [`Fleet`]: the drivers and vehicles shipments may be assigned to
//! - [`DeliveryRoute`] and [`DriverClaim`]: batch assignment of shipments to
//!   one driver, with one active route per driver
//!
//! [`CommandHandler`] loads an aggregate, runs a command against it and
//! appends the resulting events with an expected version, so a stale writer
//! gets a concurrency conflict instead of overwriting.

pub mod address;
pub mod aggregate;
pub mod cart;
pub mod command;
pub mod error;
pub mod fleet;
pub mod order;
pub mod route;
pub mod shipment;
pub mod value_objects;

pub use address::{AddressBook, AddressBookEvent, AddressEntry, AddressError, AddressId};
pub use aggregate::{Aggregate, DomainEvent};
pub use cart::{CHECKOUT_CLAIM_TTL, Cart, CartError, CartEvent, CartLine, LineId, PendingCheckout};
pub use command::{CommandHandler, CommandResult};
pub use error::DomainError;
pub use fleet::{Fleet, FleetDriver, FleetError, FleetEvent, FleetVehicle};
pub use order::{
    CancelReason, DeliveryUpdate, Order, OrderError, OrderEvent, OrderItem, OrderStatus,
    PaymentAttempt, PaymentStatus,
};
pub use route::{
    CLAIM_SETTLE_TIME, DeliveryRoute, DriverClaim, DriverClaimError, DriverClaimEvent, RouteError,
    RouteEvent,
};
pub use shipment::{
    AssignmentRecord, AssignmentSource, DeliveryStatus, Evidence, GeoPoint, Shipment,
    ShipmentError, ShipmentEvent, TrackingEntry,
};
pub use value_objects::{Address, Money, UserId, VariantId};
