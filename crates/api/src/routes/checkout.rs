//! Checkout endpoint.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use domain::AddressId;
use event_store::EventStore;
use fulfillment::OrderView;
use serde::Deserialize;

use super::{AppState, JsonBody};
use crate::error::ApiError;
use crate::identity::Identity;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub address_id: u32,
}

/// POST /checkout: turns the caller's cart into an order.
#[tracing::instrument(skip_all, fields(user = %caller.user_id))]
pub async fn checkout<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    JsonBody(req): JsonBody<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderView>), ApiError> {
    let order = app
        .checkout
        .checkout(caller.user_id, AddressId::new(req.address_id))
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}
