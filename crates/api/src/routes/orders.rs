//! Order endpoints.
//!
//! `/delivery` and `/delivery-status` are the order side's interface for the
//! delivery side and take no caller identity.

use axum::Json;
use axum::extract::{Path, State};
use bytes::Bytes;
use common::AggregateId;
use event_store::EventStore;
use fulfillment::{DeliveryInfo, OrderView};
use serde::{Deserialize, Serialize};

use super::{AppState, JsonBody, optional_json, parse_id};
use crate::error::ApiError;
use crate::identity::Identity;

#[derive(Deserialize, Default)]
pub struct PayRequest {
    pub provider: Option<String>,
}

#[derive(Deserialize)]
pub struct DeliveryStatusRequest {
    pub status: String,
    pub note: Option<String>,
}

#[derive(Serialize)]
pub struct DeliveryStatusResponse {
    pub applied: bool,
}

/// GET /orders: the caller's orders, newest first.
pub async fn list<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    Ok(Json(app.orders.list_for_user(&caller).await?))
}

/// GET /orders/{id}
pub async fn get<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError> {
    let order_id: AggregateId = parse_id(&id, "order id")?;
    Ok(Json(app.orders.get(&caller, order_id).await?))
}

/// POST /orders/{id}/pay. The body is optional.
#[tracing::instrument(skip_all, fields(user = %caller.user_id, order = %id))]
pub async fn pay<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<OrderView>, ApiError> {
    let order_id: AggregateId = parse_id(&id, "order id")?;
    let req: PayRequest = optional_json(&body)?;
    Ok(Json(app.orders.pay(&caller, order_id, req.provider).await?))
}

/// POST /orders/{id}/cancel
#[tracing::instrument(skip_all, fields(user = %caller.user_id, order = %id))]
pub async fn cancel<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError> {
    let order_id: AggregateId = parse_id(&id, "order id")?;
    Ok(Json(app.orders.cancel(&caller, order_id).await?))
}

/// GET /orders/{id}/delivery
pub async fn delivery_info<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<DeliveryInfo>, ApiError> {
    let order_id: AggregateId = parse_id(&id, "order id")?;
    Ok(Json(app.orders.delivery_info(order_id).await?))
}

/// POST /orders/{id}/delivery-status
pub async fn delivery_status<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<DeliveryStatusRequest>,
) -> Result<Json<DeliveryStatusResponse>, ApiError> {
    let order_id: AggregateId = parse_id(&id, "order id")?;
    let applied = app
        .orders
        .apply_delivery_status(order_id, &req.status, req.note.as_deref())
        .await?;
    Ok(Json(DeliveryStatusResponse { applied }))
}
