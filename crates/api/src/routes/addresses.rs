//! Address book endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{Address, AddressId};
use event_store::EventStore;
use fulfillment::AddressView;
use serde::Deserialize;

use super::{AppState, JsonBody, parse_id};
use crate::error::ApiError;
use crate::identity::Identity;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddAddressRequest {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub zip: Option<String>,
    /// Defaults to Chile when left out.
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

/// GET /addresses
pub async fn list<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
) -> Result<Json<Vec<AddressView>>, ApiError> {
    Ok(Json(app.addresses.list(caller.user_id).await?))
}

/// POST /addresses
pub async fn add<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    JsonBody(req): JsonBody<AddAddressRequest>,
) -> Result<(StatusCode, Json<AddressView>), ApiError> {
    let address = Address {
        line1: req.line1,
        line2: req.line2,
        city: req.city,
        state: req.state,
        zip: req.zip,
        country: req.country,
    };
    let view = app
        .addresses
        .add(caller.user_id, address, req.is_default)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// POST /addresses/{id}/default
pub async fn set_default<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
) -> Result<Json<Vec<AddressView>>, ApiError> {
    let address_id = AddressId::new(parse_id(&id, "address id")?);
    Ok(Json(app.addresses.set_default(caller.user_id, address_id).await?))
}

/// DELETE /addresses/{id}
pub async fn remove<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let address_id = AddressId::new(parse_id(&id, "address id")?);
    app.addresses.remove(caller.user_id, address_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
