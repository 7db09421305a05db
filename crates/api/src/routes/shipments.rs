//! Shipment endpoints.

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use common::AggregateId;
use domain::UserId;
use event_store::EventStore;
use fulfillment::{
    DeliveryEvidence, EvidenceUpload, ShipmentView, TrackingUpdate, TrackingView,
};
use serde::Deserialize;

use super::{AppState, JsonBody, parse_id};
use crate::error::ApiError;
use crate::identity::Identity;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShipmentRequest {
    pub order_id: AggregateId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub driver_id: i64,
    pub vehicle_id: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct TrackRequest {
    pub status: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub note: Option<String>,
}

fn shipment_id(raw: &str) -> Result<AggregateId, ApiError> {
    parse_id(raw, "shipment id")
}

/// Reads the evidence form. The photo may arrive as `photo` or `file`.
async fn read_evidence(mut multipart: Multipart) -> Result<DeliveryEvidence, ApiError> {
    let bad = |e: axum::extract::multipart::MultipartError| ApiError::BadRequest(e.body_text());
    let mut evidence = DeliveryEvidence::default();

    while let Some(field) = multipart.next_field().await.map_err(bad)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "photo" | "file" => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(bad)?;
                evidence.photo = Some(EvidenceUpload::new(file_name, bytes));
            }
            "receiverName" => evidence.receiver_name = Some(field.text().await.map_err(bad)?),
            "note" => {
                let note = field.text().await.map_err(bad)?;
                evidence.note = Some(note).filter(|n| !n.trim().is_empty());
            }
            "latitude" => evidence.latitude = parse_coordinate(&field.text().await.map_err(bad)?)?,
            "longitude" => {
                evidence.longitude = parse_coordinate(&field.text().await.map_err(bad)?)?
            }
            _ => {}
        }
    }
    Ok(evidence)
}

fn parse_coordinate(raw: &str) -> Result<Option<f64>, ApiError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| ApiError::BadRequest(format!("invalid coordinate: {raw}")))
}

/// POST /shipments
#[tracing::instrument(skip_all, fields(user = %caller.user_id))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    JsonBody(req): JsonBody<CreateShipmentRequest>,
) -> Result<(StatusCode, Json<ShipmentView>), ApiError> {
    let view = app.shipments.create_from_order(&caller, req.order_id).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /shipments
pub async fn list_mine<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
) -> Result<Json<Vec<ShipmentView>>, ApiError> {
    Ok(Json(app.shipments.list_mine(&caller).await?))
}

/// GET /shipments/assigned
pub async fn list_assigned<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
) -> Result<Json<Vec<ShipmentView>>, ApiError> {
    Ok(Json(app.shipments.list_assigned_to_me(&caller).await?))
}

/// GET /shipments/{id}
pub async fn get<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
) -> Result<Json<ShipmentView>, ApiError> {
    Ok(Json(app.shipments.get(&caller, shipment_id(&id)?).await?))
}

/// POST /shipments/{id}/assign
pub async fn assign<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<AssignRequest>,
) -> Result<Json<ShipmentView>, ApiError> {
    let view = app
        .assignment
        .assign(
            &caller,
            shipment_id(&id)?,
            UserId::new(req.driver_id),
            req.vehicle_id,
        )
        .await?;
    Ok(Json(view))
}

/// POST /shipments/{id}/start
pub async fn start<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
) -> Result<Json<ShipmentView>, ApiError> {
    Ok(Json(app.shipments.start(&caller, shipment_id(&id)?).await?))
}

/// POST /shipments/{id}/delivered (multipart)
pub async fn delivered<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<ShipmentView>, ApiError> {
    let id = shipment_id(&id)?;
    let evidence = read_evidence(multipart).await?;
    Ok(Json(app.shipments.delivered(&caller, id, evidence).await?))
}

/// POST /shipments/{id}/fail (multipart)
pub async fn fail<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<ShipmentView>, ApiError> {
    let id = shipment_id(&id)?;
    let evidence = read_evidence(multipart).await?;
    Ok(Json(app.shipments.fail(&caller, id, evidence).await?))
}

/// POST /shipments/{id}/cancel
pub async fn cancel<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
) -> Result<Json<ShipmentView>, ApiError> {
    Ok(Json(app.shipments.cancel(&caller, shipment_id(&id)?).await?))
}

/// POST /shipments/{id}/track
pub async fn track<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<TrackRequest>,
) -> Result<(StatusCode, Json<TrackingView>), ApiError> {
    let update = TrackingUpdate {
        status: req.status,
        latitude: req.latitude,
        longitude: req.longitude,
        note: req.note,
    };
    let entry = app.shipments.track(&caller, shipment_id(&id)?, update).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// GET /shipments/{id}/tracking
pub async fn tracking<S: EventStore + Clone + 'static>(
    State(app): State<AppState<S>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
) -> Result<Json<Vec<TrackingView>>, ApiError> {
    Ok(Json(app.shipments.list_tracking(&caller, shipment_id(&id)?).await?))
}
