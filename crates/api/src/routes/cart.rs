//! Cart endpoints. The cart is always the caller's own.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{LineId, VariantId};
use event_store::EventStore;
use fulfillment::CartView;
use serde::Deserialize;

use super::{AppState, JsonBody, parse_id};
use crate::error::ApiError;
use crate::identity::Identity;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub variant_id: i64,
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

/// GET /cart
pub async fn get<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
) -> Result<Json<CartView>, ApiError> {
    Ok(Json(app.carts.get_or_create(caller.user_id).await?))
}

/// POST /cart/items
#[tracing::instrument(skip_all, fields(user = %caller.user_id))]
pub async fn add_item<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    JsonBody(req): JsonBody<AddItemRequest>,
) -> Result<Json<CartView>, ApiError> {
    let cart = app
        .carts
        .add_item(caller.user_id, VariantId::new(req.variant_id), req.quantity)
        .await?;
    Ok(Json(cart))
}

/// PATCH /cart/items/{lineId}
pub async fn update_quantity<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    Path(line_id): Path<String>,
    JsonBody(req): JsonBody<UpdateQuantityRequest>,
) -> Result<Json<CartView>, ApiError> {
    let line_id = LineId::new(parse_id(&line_id, "line id")?);
    let cart = app
        .carts
        .update_quantity(caller.user_id, line_id, req.quantity)
        .await?;
    Ok(Json(cart))
}

/// DELETE /cart/items/{lineId}
pub async fn remove_line<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    Path(line_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let line_id = LineId::new(parse_id(&line_id, "line id")?);
    app.carts.remove_line(caller.user_id, line_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /cart/items/by-variant/{variantId}
pub async fn remove_variant<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    Path(variant_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let variant_id = VariantId::new(parse_id(&variant_id, "variant id")?);
    app.carts.remove_variant(caller.user_id, variant_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /cart
pub async fn clear<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
) -> Result<StatusCode, ApiError> {
    app.carts.clear(caller.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
