//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use domain::{Money, VariantId};
use event_store::InMemoryEventStore;
use fulfillment::{
    Collaborators, Fulfillment, FulfillmentSettings, InMemoryEvidenceStore,
    InMemoryInventoryService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const CUSTOMER: &str = "7";
const DRIVER: &str = "20";
const ADMIN: &str = "1";
const BOUNDARY: &str = "evidence-boundary";

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> axum::Router {
    let inventory = InMemoryInventoryService::new()
        .with_variant(VariantId::new(10), Money::from_major(1000), 50)
        .with_variant(VariantId::new(11), Money::from_major(450), 5);
    let state = Fulfillment::new(
        InMemoryEventStore::new(),
        Collaborators {
            inventory: Arc::new(inventory),
            orders: None,
            evidence: Arc::new(InMemoryEvidenceStore::new()),
        },
        &FulfillmentSettings::default(),
    );
    api::create_app(Arc::new(state), get_metrics_handle())
}

fn request(method: &str, uri: &str, user: Option<(&str, &str)>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((id, role)) = user {
        builder = builder.header("x-user-id", id).header("x-user-role", role);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn customer() -> Option<(&'static str, &'static str)> {
    Some((CUSTOMER, "customer"))
}

fn admin() -> Option<(&'static str, &'static str)> {
    Some((ADMIN, "admin"))
}

fn driver(id: &'static str) -> Option<(&'static str, &'static str)> {
    Some((id, "driver"))
}

async fn send(app: &axum::Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Adds two units of variant 10, a default address and checks out.
async fn place_order(app: &axum::Router) -> String {
    let response = send(
        app,
        request("POST", "/cart/items", customer(), Some(json!({"variantId": 10, "quantity": 2}))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        app,
        request(
            "POST",
            "/addresses",
            customer(),
            Some(json!({"line1": "Huérfanos 1160", "city": "Santiago", "isDefault": true})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let address = json_body(response).await;

    let response = send(
        app,
        request("POST", "/checkout", customer(), Some(json!({"addressId": address["id"]}))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let order = json_body(response).await;
    order["id"].as_str().unwrap().to_string()
}

fn multipart(fields: &[(&str, &str)], photo: Option<&[u8]>) -> Body {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(photo) = photo {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"door.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(photo);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

fn multipart_request(uri: &str, user: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-user-id", user)
        .header("x-user-role", "driver")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(body)
        .unwrap()
}

/// Registers [`DRIVER`] and vehicle VAN-1. Registering again changes nothing.
async fn register_fleet(app: &axum::Router) {
    let response = send(
        app,
        request("POST", "/fleet/drivers", admin(), Some(json!({"driverId": 20, "name": "Rosa"}))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = send(
        app,
        request("POST", "/fleet/vehicles", admin(), Some(json!({"vehicleId": "VAN-1"}))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

/// Creates a shipment for a fresh order and assigns it to [`DRIVER`].
async fn assigned_shipment(app: &axum::Router) -> String {
    register_fleet(app).await;
    let order_id = place_order(app).await;
    let response = send(
        app,
        request("POST", "/shipments", customer(), Some(json!({"orderId": order_id}))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let shipment = json_body(response).await;
    let shipment_id = shipment["id"].as_str().unwrap().to_string();

    let response = send(
        app,
        request(
            "POST",
            &format!("/shipments/{shipment_id}/assign"),
            admin(),
            Some(json!({"driverId": 20, "vehicleId": "VAN-1"})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    shipment_id
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let response = send(&app, request("GET", "/health", None, None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_missing_user_header_is_unauthorized() {
    let app = setup();

    let response = send(&app, request("GET", "/cart", None, None)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn test_non_numeric_user_header_is_bad_request() {
    let app = setup();

    let response = send(&app, request("GET", "/cart", Some(("abc", "customer")), None)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_add_item_then_get_cart() {
    let app = setup();

    let response = send(
        &app,
        request("POST", "/cart/items", customer(), Some(json!({"variantId": 11, "quantity": 3}))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, request("GET", "/cart", customer(), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cart = json_body(response).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["items"][0]["variantId"], 11);
    assert_eq!(cart["items"][0]["quantity"], 3);
    assert_eq!(cart["total"], "1350.00");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = setup();

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/cart/items")
            .header("x-user-id", CUSTOMER)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn test_checkout_creates_order_and_empties_cart() {
    let app = setup();

    let order_id = place_order(&app).await;

    let response = send(&app, request("GET", &format!("/orders/{order_id}"), customer(), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let order = json_body(response).await;
    assert_eq!(order["status"], "CREATED");
    assert_eq!(order["totalAmount"], "2000.00");
    assert_eq!(order["items"][0]["quantity"], 2);

    let cart = json_body(send(&app, request("GET", "/cart", customer(), None)).await).await;
    assert!(cart["items"].as_array().unwrap().is_empty());

    let orders = json_body(send(&app, request("GET", "/orders", customer(), None)).await).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_checkout_with_empty_cart_is_bad_request() {
    let app = setup();

    let response = send(
        &app,
        request("POST", "/checkout", customer(), Some(json!({"addressId": 1}))),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let app = setup();
    let missing = common::AggregateId::new();

    let response = send(&app, request("GET", &format!("/orders/{missing}"), customer(), None)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn test_invalid_order_id_is_bad_request() {
    let app = setup();

    let response = send(&app, request("GET", "/orders/not-a-uuid", customer(), None)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_pay_then_pay_again_conflicts() {
    let app = setup();
    let order_id = place_order(&app).await;

    let response = send(
        &app,
        request("POST", &format!("/orders/{order_id}/pay"), customer(), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "PAID");

    let response = send(
        &app,
        request("POST", &format!("/orders/{order_id}/pay"), customer(), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_delivery_info_needs_no_identity() {
    let app = setup();
    let order_id = place_order(&app).await;

    let response = send(&app, request("GET", &format!("/orders/{order_id}/delivery"), None, None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let info = json_body(response).await;
    assert_eq!(info["userId"], 7);
    assert_eq!(info["shippingAddress"]["city"], "Santiago");
}

#[tokio::test]
async fn test_assign_requires_admin() {
    let app = setup();
    let order_id = place_order(&app).await;
    let shipment = json_body(
        send(
            &app,
            request("POST", "/shipments", customer(), Some(json!({"orderId": order_id}))),
        )
        .await,
    )
    .await;
    let shipment_id = shipment["id"].as_str().unwrap();

    let response = send(
        &app,
        request(
            "POST",
            &format!("/shipments/{shipment_id}/assign"),
            driver(DRIVER),
            Some(json!({"driverId": 20})),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_delivered_without_photo_is_bad_request() {
    let app = setup();
    let shipment_id = assigned_shipment(&app).await;

    let response = send(
        &app,
        multipart_request(
            &format!("/shipments/{shipment_id}/delivered"),
            DRIVER,
            multipart(&[("receiverName", "Ana")], None),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delivered_with_photo_serves_evidence() {
    let app = setup();
    let shipment_id = assigned_shipment(&app).await;
    let photo = [137u8, 80, 78, 71, 13, 10, 26, 10];

    let response = send(
        &app,
        multipart_request(
            &format!("/shipments/{shipment_id}/delivered"),
            DRIVER,
            multipart(
                &[
                    ("receiverName", "Ana"),
                    ("note", "left with concierge"),
                    ("latitude", "-33.4372"),
                    ("longitude", "-70.6506"),
                ],
                Some(&photo),
            ),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let shipment = json_body(response).await;
    assert_eq!(shipment["status"], "DELIVERED");
    assert_eq!(shipment["receiverName"], "Ana");
    let url = shipment["evidenceUrl"].as_str().unwrap().to_string();
    assert!(url.starts_with("/evidence/"));

    let response = send(&app, request("GET", &url, None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], &photo[..]);
}

#[tokio::test]
async fn test_bad_coordinate_is_bad_request() {
    let app = setup();
    let shipment_id = assigned_shipment(&app).await;

    let response = send(
        &app,
        multipart_request(
            &format!("/shipments/{shipment_id}/fail"),
            DRIVER,
            multipart(&[("latitude", "north")], Some(&[1, 2, 3])),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_track_appends_to_history() {
    let app = setup();
    let shipment_id = assigned_shipment(&app).await;

    let response = send(
        &app,
        request(
            "POST",
            &format!("/shipments/{shipment_id}/track"),
            driver(DRIVER),
            Some(json!({"status": "IN_TRANSIT", "note": "left the depot"})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json_body(response).await["status"], "IN_TRANSIT");

    let response = send(
        &app,
        request("GET", &format!("/shipments/{shipment_id}/tracking"), driver(DRIVER), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let history = json_body(response).await;
    let last = history.as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["note"], "left the depot");
}

#[tokio::test]
async fn test_missing_evidence_is_not_found() {
    let app = setup();

    let response = send(&app, request("GET", "/evidence/nothing.png", None, None)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_route_take_conflicts_for_second_driver() {
    let app = setup();
    let order_id = place_order(&app).await;

    let response = send(
        &app,
        request(
            "POST",
            "/routes",
            admin(),
            Some(json!({"name": "Centro AM", "orderIds": [order_id]})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let route = json_body(response).await;
    let route_id = route["id"].as_str().unwrap().to_string();
    assert_eq!(route["totalPrice"], "1900.00");

    let active = json_body(send(&app, request("GET", "/routes/active", driver(DRIVER), None)).await).await;
    assert_eq!(active.as_array().unwrap().len(), 1);

    let response = send(
        &app,
        request("POST", &format!("/routes/{route_id}/take"), driver(DRIVER), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        request("POST", &format!("/routes/{route_id}/take"), driver("21"), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(
        &app,
        request("GET", &format!("/routes/{route_id}/shipments"), driver(DRIVER), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let shipments = json_body(response).await;
    assert_eq!(shipments.as_array().unwrap().len(), 1);
    assert_eq!(shipments[0]["assignedUserId"], 20);
}

#[tokio::test]
async fn test_route_creation_requires_admin() {
    let app = setup();
    let order_id = place_order(&app).await;

    let response = send(
        &app,
        request(
            "POST",
            "/routes",
            customer(),
            Some(json!({"name": "Centro AM", "orderIds": [order_id]})),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();

    let response = send(&app, request("GET", "/metrics", None, None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_assign_needs_a_registered_driver_and_vehicle() {
    let app = setup();
    let order_id = place_order(&app).await;
    let response = send(
        &app,
        request("POST", "/shipments", customer(), Some(json!({"orderId": order_id}))),
    )
    .await;
    let shipment_id = json_body(response).await["id"].as_str().unwrap().to_string();
    let assign = |body: Value| {
        request("POST", &format!("/shipments/{shipment_id}/assign"), admin(), Some(body))
    };

    let response = send(&app, assign(json!({"driverId": 20}))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    register_fleet(&app).await;
    let response = send(&app, assign(json!({"driverId": 20, "vehicleId": "TRUCK-9"}))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = send(&app, assign(json!({"driverId": 20, "vehicleId": "van-1"}))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, request("DELETE", "/fleet/drivers/20", admin(), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let fleet = json_body(response).await;
    assert_eq!(fleet["drivers"][0]["active"], false);
    assert_eq!(fleet["vehicles"][0]["vehicleId"], "VAN-1");

    let response = send(&app, assign(json!({"driverId": 20}))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_fleet_is_admin_only() {
    let app = setup();

    let response = send(&app, request("GET", "/fleet", driver(DRIVER), None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        request("POST", "/fleet/drivers", customer(), Some(json!({"driverId": 7, "name": "Me"}))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&app, request("GET", "/fleet", admin(), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["drivers"], json!([]));
}
