//! Order side as seen from the delivery side.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::AggregateId;
use domain::DeliveryStatus;
use event_store::EventStore;
use reqwest::StatusCode;
use serde::Serialize;

use crate::error::FulfillmentError;
use crate::orders::OrderService;
use crate::views::DeliveryInfo;

const SERVICE: &str = "order service";

/// Operations the shipment side consumes from the order side.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn delivery_info(&self, order_id: AggregateId) -> Result<DeliveryInfo, FulfillmentError>;

    /// Reports a delivery outcome. Callers treat this as fire-and-forget.
    async fn report_delivery_status(
        &self,
        order_id: AggregateId,
        status: DeliveryStatus,
        note: Option<String>,
    ) -> Result<(), FulfillmentError>;
}

/// Calls the order service in the same process.
#[derive(Clone)]
pub struct LocalOrderGateway<S: EventStore> {
    orders: OrderService<S>,
}

impl<S: EventStore + Clone> LocalOrderGateway<S> {
    pub fn new(orders: OrderService<S>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl<S: EventStore + Clone + 'static> OrderGateway for LocalOrderGateway<S> {
    async fn delivery_info(&self, order_id: AggregateId) -> Result<DeliveryInfo, FulfillmentError> {
        self.orders.delivery_info(order_id).await
    }

    async fn report_delivery_status(
        &self,
        order_id: AggregateId,
        status: DeliveryStatus,
        note: Option<String>,
    ) -> Result<(), FulfillmentError> {
        self.orders
            .apply_delivery_status(order_id, status.as_str(), note.as_deref())
            .await
            .map(|_| ())
    }
}

#[derive(Debug, Serialize)]
struct DeliveryStatusRequest<'a> {
    status: &'a str,
    note: Option<&'a str>,
}

/// Calls a remote order service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpOrderGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrderGateway {
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> Result<Self, FulfillmentError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| FulfillmentError::Internal(format!("order client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl OrderGateway for HttpOrderGateway {
    #[tracing::instrument(skip(self))]
    async fn delivery_info(&self, order_id: AggregateId) -> Result<DeliveryInfo, FulfillmentError> {
        let response = self
            .client
            .get(format!("{}/orders/{order_id}/delivery", self.base_url))
            .send()
            .await
            .map_err(|e| FulfillmentError::upstream(SERVICE, &e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(FulfillmentError::NotFound("Order"));
        }
        response
            .error_for_status()
            .map_err(|e| FulfillmentError::upstream(SERVICE, &e))?
            .json()
            .await
            .map_err(|e| FulfillmentError::upstream(SERVICE, &e))
    }

    #[tracing::instrument(skip(self, note))]
    async fn report_delivery_status(
        &self,
        order_id: AggregateId,
        status: DeliveryStatus,
        note: Option<String>,
    ) -> Result<(), FulfillmentError> {
        self.client
            .post(format!("{}/orders/{order_id}/delivery-status", self.base_url))
            .json(&DeliveryStatusRequest {
                status: status.as_str(),
                note: note.as_deref(),
            })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FulfillmentError::upstream(SERVICE, &e))?;
        Ok(())
    }
}

/// One delivery outcome on its way to the order side.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReport {
    pub order_id: AggregateId,
    pub status: DeliveryStatus,
    pub note: Option<String>,
}

#[derive(Debug, Default)]
struct InMemoryOrderGatewayState {
    orders: HashMap<AggregateId, DeliveryInfo>,
    reports: Vec<DeliveryReport>,
    fail_reports: bool,
}

/// In-memory order side for testing the delivery side in isolation.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderGateway {
    state: Arc<RwLock<InMemoryOrderGatewayState>>,
}

impl InMemoryOrderGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, info: DeliveryInfo) {
        self.state
            .write()
            .unwrap()
            .orders
            .insert(info.order_id, info);
    }

    pub fn set_fail_reports(&self, fail: bool) {
        self.state.write().unwrap().fail_reports = fail;
    }

    pub fn reports(&self) -> Vec<DeliveryReport> {
        self.state.read().unwrap().reports.clone()
    }
}

#[async_trait]
impl OrderGateway for InMemoryOrderGateway {
    async fn delivery_info(&self, order_id: AggregateId) -> Result<DeliveryInfo, FulfillmentError> {
        self.state
            .read()
            .unwrap()
            .orders
            .get(&order_id)
            .cloned()
            .ok_or(FulfillmentError::NotFound("Order"))
    }

    async fn report_delivery_status(
        &self,
        order_id: AggregateId,
        status: DeliveryStatus,
        note: Option<String>,
    ) -> Result<(), FulfillmentError> {
        let mut state = self.state.write().unwrap();
        if state.fail_reports {
            return Err(FulfillmentError::UpstreamUnavailable {
                service: SERVICE,
                message: "connection refused".to_string(),
                timed_out: false,
            });
        }
        state.reports.push(DeliveryReport {
            order_id,
            status,
            note,
        });
        Ok(())
    }
}
