//! HTTP API server for the order fulfillment pipeline.
//!
//! Exposes carts, addresses, checkout, orders, shipments, the driver fleet
//! and delivery routes over REST, with structured logging (tracing) and
//! Prometheus metrics. Callers identify themselves through the `x-user-id` and
//! `x-user-role` headers set by the gateway in front of this service.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, patch, post};
use event_store::EventStore;
use fulfillment::{
    Collaborators, EvidenceStore, FsEvidenceStore, Fulfillment, FulfillmentError,
    HttpCatalogClient, HttpOrderGateway, InMemoryInventoryService, InventoryService, OrderGateway,
};
use metrics_exporter_prometheus::PrometheusHandle;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::AppState;

/// Upper bound for request bodies; delivery photos are the largest.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Errors that stop the server from starting or running.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to install metrics recorder: {0}")]
    Metrics(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("event store error: {0}")]
    Store(#[from] event_store::EventStoreError),

    #[error("collaborator setup failed: {0}")]
    Collaborator(#[from] FulfillmentError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: AppState<S>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::{
        addresses, cart, checkout, delivery_routes, evidence, fleet, orders, shipments,
    };

    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/cart", get(cart::get::<S>).delete(cart::clear::<S>))
        .route("/cart/items", post(cart::add_item::<S>))
        .route(
            "/cart/items/{line_id}",
            patch(cart::update_quantity::<S>).delete(cart::remove_line::<S>),
        )
        .route(
            "/cart/items/by-variant/{variant_id}",
            delete(cart::remove_variant::<S>),
        )
        .route(
            "/addresses",
            get(addresses::list::<S>).post(addresses::add::<S>),
        )
        .route("/addresses/{id}", delete(addresses::remove::<S>))
        .route("/addresses/{id}/default", post(addresses::set_default::<S>))
        .route("/checkout", post(checkout::checkout::<S>))
        .route("/orders", get(orders::list::<S>))
        .route("/orders/{id}", get(orders::get::<S>))
        .route("/orders/{id}/pay", post(orders::pay::<S>))
        .route("/orders/{id}/cancel", post(orders::cancel::<S>))
        .route("/orders/{id}/delivery", get(orders::delivery_info::<S>))
        .route(
            "/orders/{id}/delivery-status",
            post(orders::delivery_status::<S>),
        )
        .route(
            "/shipments",
            get(shipments::list_mine::<S>).post(shipments::create::<S>),
        )
        .route("/shipments/assigned", get(shipments::list_assigned::<S>))
        .route("/shipments/{id}", get(shipments::get::<S>))
        .route("/shipments/{id}/assign", post(shipments::assign::<S>))
        .route("/shipments/{id}/start", post(shipments::start::<S>))
        .route("/shipments/{id}/delivered", post(shipments::delivered::<S>))
        .route("/shipments/{id}/fail", post(shipments::fail::<S>))
        .route("/shipments/{id}/cancel", post(shipments::cancel::<S>))
        .route("/shipments/{id}/track", post(shipments::track::<S>))
        .route("/shipments/{id}/tracking", get(shipments::tracking::<S>))
        .route("/fleet", get(fleet::get::<S>))
        .route("/fleet/drivers", post(fleet::register_driver::<S>))
        .route("/fleet/drivers/{id}", delete(fleet::retire_driver::<S>))
        .route("/fleet/vehicles", post(fleet::register_vehicle::<S>))
        .route("/fleet/vehicles/{id}", delete(fleet::retire_vehicle::<S>))
        .route("/routes", post(delivery_routes::create::<S>))
        .route("/routes/active", get(delivery_routes::list_active::<S>))
        .route("/routes/{id}", get(delivery_routes::get::<S>))
        .route("/routes/{id}/take", post(delivery_routes::take::<S>))
        .route("/routes/{id}/close", post(delivery_routes::close::<S>))
        .route("/routes/{id}/shipments", get(delivery_routes::shipments::<S>))
        .route("/evidence/{file_name}", get(evidence::get::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the fulfillment services to the collaborators named in `config`.
///
/// Without `CATALOG_URL` the catalog is an empty in-memory one, and without
/// `ORDER_SERVICE_URL` shipments talk to the order service of this process.
/// Spawns the delivery notifier, so it must run inside a tokio runtime.
pub fn build_state<S: EventStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> Result<AppState<S>, ServerError> {
    let inventory: Arc<dyn InventoryService> = match &config.catalog_url {
        Some(url) => Arc::new(HttpCatalogClient::new(
            url.as_str(),
            config.upstream_connect_timeout,
            config.upstream_timeout,
        )?),
        None => {
            tracing::warn!("CATALOG_URL not set, using an in-memory catalog");
            Arc::new(InMemoryInventoryService::new())
        }
    };

    let orders = match &config.order_service_url {
        Some(url) => Some(Arc::new(HttpOrderGateway::new(
            url.as_str(),
            config.upstream_connect_timeout,
            config.upstream_timeout,
        )?) as Arc<dyn OrderGateway>),
        None => None,
    };

    let evidence: Arc<dyn EvidenceStore> = Arc::new(FsEvidenceStore::new(&config.evidence_dir));

    let collaborators = Collaborators {
        inventory,
        orders,
        evidence,
    };
    Ok(Arc::new(Fulfillment::new(
        store,
        collaborators,
        &config.fulfillment_settings(),
    )))
}
