//! Fulfillment services for the order pipeline.
//!
//! Each service coordinates one or more aggregates from the `domain` crate
//! with the collaborators they depend on:
//! - [`CartService`] and [`AddressService`]: per-user state
//! - [`CheckoutService`]: cart to order, decrementing remote stock per line
//! - [`OrderService`]: payment, cancellation with restock, delivery outcomes
//! - [`ShipmentService`] and [`AssignmentService`]: the delivery side
//! - [`FleetService`]: the drivers and vehicles assignments may name
//! - [`RouteService`]: batches of shipments taken by one driver
//!
//! Collaborators sit behind the traits in [`services`], each with an HTTP
//! client and an in-memory implementation. [`Fulfillment`] wires everything
//! over one event store.

pub mod addresses;
pub mod assignment;
pub mod caller;
pub mod cart;
pub mod checkout;
pub mod error;
pub mod fleet;
pub mod notifier;
pub mod orders;
mod retry;
pub mod routes;
pub mod services;
pub mod settings;
pub mod shipments;
pub mod views;

use std::sync::Arc;

use event_store::EventStore;

pub use addresses::AddressService;
pub use assignment::AssignmentService;
pub use caller::Caller;
pub use cart::CartService;
pub use checkout::{CheckoutLog, CheckoutService, CheckoutState};
pub use error::{ErrorKind, FulfillmentError, Result};
pub use fleet::FleetService;
pub use notifier::DeliveryNotifier;
pub use orders::OrderService;
pub use routes::{RouteRequest, RouteService};
pub use services::{
    EvidenceStore, EvidenceUpload, FsEvidenceStore, HttpCatalogClient, HttpOrderGateway,
    InMemoryEvidenceStore, InMemoryInventoryService, InMemoryOrderGateway, InventoryService,
    LocalOrderGateway, OrderGateway,
};
pub use settings::FulfillmentSettings;
pub use shipments::{DeliveryEvidence, ShipmentService, TrackingUpdate};
pub use views::{
    AddressView, CartLineView, CartView, DeliveryInfo, DriverView, FleetView, OrderItemView,
    OrderView, PaymentView, RouteView, ShipmentView, TrackingView, VehicleView,
};

/// External collaborators the services call out to.
pub struct Collaborators {
    pub inventory: Arc<dyn InventoryService>,
    /// The order side as seen by shipments. `None` uses the order service
    /// of this process.
    pub orders: Option<Arc<dyn OrderGateway>>,
    pub evidence: Arc<dyn EvidenceStore>,
}

/// Every fulfillment service over one event store.
pub struct Fulfillment<S: EventStore> {
    pub carts: CartService<S>,
    pub addresses: AddressService<S>,
    pub checkout: CheckoutService<S>,
    pub orders: OrderService<S>,
    pub shipments: ShipmentService<S>,
    pub assignment: AssignmentService<S>,
    pub fleet: FleetService<S>,
    pub routes: RouteService<S>,
    pub evidence: Arc<dyn EvidenceStore>,
}

impl<S: EventStore + Clone> Clone for Fulfillment<S> {
    fn clone(&self) -> Self {
        Self {
            carts: self.carts.clone(),
            addresses: self.addresses.clone(),
            checkout: self.checkout.clone(),
            orders: self.orders.clone(),
            shipments: self.shipments.clone(),
            assignment: self.assignment.clone(),
            fleet: self.fleet.clone(),
            routes: self.routes.clone(),
            evidence: Arc::clone(&self.evidence),
        }
    }
}

impl<S: EventStore + Clone + 'static> Fulfillment<S> {
    /// Builds the services and starts the delivery notifier, so this must
    /// run inside a tokio runtime.
    pub fn new(store: S, collaborators: Collaborators, settings: &FulfillmentSettings) -> Self {
        let Collaborators {
            inventory,
            orders: order_gateway,
            evidence,
        } = collaborators;

        let orders = OrderService::new(store.clone(), Arc::clone(&inventory), settings);
        let order_gateway: Arc<dyn OrderGateway> = match order_gateway {
            Some(gateway) => gateway,
            None => Arc::new(LocalOrderGateway::new(orders.clone())),
        };
        let notifier = DeliveryNotifier::spawn(Arc::clone(&order_gateway), settings);
        let fleet = FleetService::new(store.clone(), settings);

        Self {
            carts: CartService::new(store.clone(), Arc::clone(&inventory), settings),
            addresses: AddressService::new(store.clone()),
            checkout: CheckoutService::new(store.clone(), inventory, settings),
            shipments: ShipmentService::new(
                store.clone(),
                Arc::clone(&order_gateway),
                Arc::clone(&evidence),
                notifier,
                settings.delivery_rate,
            ),
            assignment: AssignmentService::new(store.clone(), fleet.clone()),
            fleet,
            routes: RouteService::new(store, order_gateway, settings),
            orders,
            evidence,
        }
    }
}
