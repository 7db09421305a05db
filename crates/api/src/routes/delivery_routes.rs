//! Delivery route endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::AggregateId;
use event_store::EventStore;
use fulfillment::{RouteRequest, RouteView, ShipmentView};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{AppState, JsonBody, parse_id};
use crate::error::ApiError;
use crate::identity::Identity;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRouteRequest {
    pub name: String,
    pub description: Option<String>,
    pub order_ids: Vec<AggregateId>,
    pub total_price: Option<Decimal>,
}

fn route_id(raw: &str) -> Result<AggregateId, ApiError> {
    parse_id(raw, "route id")
}

/// POST /routes (admin)
#[tracing::instrument(skip_all, fields(user = %caller.user_id))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    JsonBody(req): JsonBody<CreateRouteRequest>,
) -> Result<(StatusCode, Json<RouteView>), ApiError> {
    let request = RouteRequest {
        name: req.name,
        description: req.description,
        order_ids: req.order_ids,
        total_price: req.total_price,
    };
    let route = app.routes.create_route(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(route)))
}

/// GET /routes/active
pub async fn list_active<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(_caller): Identity,
) -> Result<Json<Vec<RouteView>>, ApiError> {
    Ok(Json(app.routes.list_active().await?))
}

/// GET /routes/{id}
pub async fn get<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(_caller): Identity,
    Path(id): Path<String>,
) -> Result<Json<RouteView>, ApiError> {
    Ok(Json(app.routes.get(route_id(&id)?).await?))
}

/// POST /routes/{id}/take
#[tracing::instrument(skip_all, fields(driver = %caller.user_id, route = %id))]
pub async fn take<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
) -> Result<Json<RouteView>, ApiError> {
    Ok(Json(app.routes.take_route(&caller, route_id(&id)?).await?))
}

/// POST /routes/{id}/close
pub async fn close<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
) -> Result<Json<RouteView>, ApiError> {
    Ok(Json(app.routes.close_route(&caller, route_id(&id)?).await?))
}

/// GET /routes/{id}/shipments
pub async fn shipments<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
) -> Result<Json<Vec<ShipmentView>>, ApiError> {
    Ok(Json(app.routes.shipments_by_route(&caller, route_id(&id)?).await?))
}
