//! Fleet registry endpoints. Admin only.

use axum::Json;
use axum::extract::{Path, State};
use domain::UserId;
use event_store::EventStore;
use fulfillment::FleetView;
use serde::Deserialize;

use super::{AppState, JsonBody, parse_id};
use crate::error::ApiError;
use crate::identity::Identity;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDriverRequest {
    pub driver_id: i64,
    pub name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterVehicleRequest {
    pub vehicle_id: String,
    pub description: Option<String>,
}

/// GET /fleet
pub async fn get<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
) -> Result<Json<FleetView>, ApiError> {
    Ok(Json(app.fleet.get(&caller).await?))
}

/// POST /fleet/drivers
pub async fn register_driver<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    JsonBody(req): JsonBody<RegisterDriverRequest>,
) -> Result<Json<FleetView>, ApiError> {
    let view = app
        .fleet
        .register_driver(&caller, UserId::new(req.driver_id), &req.name)
        .await?;
    Ok(Json(view))
}

/// DELETE /fleet/drivers/{id}
pub async fn retire_driver<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
) -> Result<Json<FleetView>, ApiError> {
    let driver_id: i64 = parse_id(&id, "driver id")?;
    Ok(Json(app.fleet.retire_driver(&caller, UserId::new(driver_id)).await?))
}

/// POST /fleet/vehicles
pub async fn register_vehicle<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    JsonBody(req): JsonBody<RegisterVehicleRequest>,
) -> Result<Json<FleetView>, ApiError> {
    let view = app
        .fleet
        .register_vehicle(&caller, &req.vehicle_id, req.description)
        .await?;
    Ok(Json(view))
}

/// DELETE /fleet/vehicles/{id}
pub async fn retire_vehicle<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
) -> Result<Json<FleetView>, ApiError> {
    Ok(Json(app.fleet.retire_vehicle(&caller, &id).await?))
}
