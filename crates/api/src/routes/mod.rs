//! HTTP handlers, one module per resource.

pub mod addresses;
pub mod cart;
pub mod checkout;
pub mod delivery_routes;
pub mod evidence;
pub mod fleet;
pub mod orders;
pub mod shipments;
pub mod system;

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{FromRequest, Request};
use bytes::Bytes;
use fulfillment::Fulfillment;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub type AppState<S> = Arc<Fulfillment<S>>;

/// JSON body whose rejections render as [`ApiError`].
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        Ok(JsonBody(value))
    }
}

/// Parses a body that may be left out entirely.
pub(crate) fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
}

/// Parses a path segment.
pub(crate) fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid {what}: {raw}")))
}
