//! Inventory collaborator: authoritative prices and stock per variant.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use domain::{Money, VariantId};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::FulfillmentError;

const SERVICE: &str = "catalog";

/// Price and sellable stock of one variant at the time of the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantSnapshot {
    pub variant_id: VariantId,
    pub price: Money,
    pub available_stock: u32,
}

/// A stock change as sent to the collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockAdjustment {
    pub variant_id: VariantId,
    pub delta: i64,
}

/// Operations consumed from the inventory side.
#[async_trait]
pub trait InventoryService: Send + Sync {
    async fn get_variant(&self, variant_id: VariantId) -> Result<VariantSnapshot, FulfillmentError>;

    /// Negative deltas reserve stock, positive ones restock. Fails with
    /// `OutOfStock` when the stock would go negative.
    async fn adjust_stock(&self, variant_id: VariantId, delta: i64) -> Result<(), FulfillmentError>;
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    variants: HashMap<VariantId, (Money, i64)>,
    adjustments: Vec<StockAdjustment>,
    unreachable: bool,
}

/// In-memory inventory for tests and single-process deployments.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryService {
    state: Arc<RwLock<InMemoryInventoryState>>,
}

impl InMemoryInventoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a variant with its price and stock.
    pub fn set_variant(&self, variant_id: VariantId, price: Money, stock: i64) {
        self.state
            .write()
            .unwrap()
            .variants
            .insert(variant_id, (price, stock));
    }

    pub fn with_variant(self, variant_id: VariantId, price: Money, stock: i64) -> Self {
        self.set_variant(variant_id, price, stock);
        self
    }

    /// Makes every call fail as if the collaborator were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.write().unwrap().unreachable = unreachable;
    }

    pub fn stock_of(&self, variant_id: VariantId) -> Option<i64> {
        self.state
            .read()
            .unwrap()
            .variants
            .get(&variant_id)
            .map(|(_, stock)| *stock)
    }

    /// Every successful adjustment, in call order.
    pub fn adjustments(&self) -> Vec<StockAdjustment> {
        self.state.read().unwrap().adjustments.clone()
    }

    fn unavailable() -> FulfillmentError {
        FulfillmentError::UpstreamUnavailable {
            service: SERVICE,
            message: "connection refused".to_string(),
            timed_out: false,
        }
    }
}

#[async_trait]
impl InventoryService for InMemoryInventoryService {
    async fn get_variant(&self, variant_id: VariantId) -> Result<VariantSnapshot, FulfillmentError> {
        let state = self.state.read().unwrap();
        if state.unreachable {
            return Err(Self::unavailable());
        }
        let (price, stock) = state
            .variants
            .get(&variant_id)
            .ok_or(FulfillmentError::NotFound("Variant"))?;
        Ok(VariantSnapshot {
            variant_id,
            price: *price,
            available_stock: u32::try_from((*stock).max(0)).unwrap_or(u32::MAX),
        })
    }

    async fn adjust_stock(&self, variant_id: VariantId, delta: i64) -> Result<(), FulfillmentError> {
        let mut state = self.state.write().unwrap();
        if state.unreachable {
            return Err(Self::unavailable());
        }
        let (_, stock) = state
            .variants
            .get_mut(&variant_id)
            .ok_or(FulfillmentError::NotFound("Variant"))?;
        if *stock + delta < 0 {
            return Err(FulfillmentError::OutOfStock { variant_id });
        }
        *stock += delta;
        state.adjustments.push(StockAdjustment { variant_id, delta });
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariantResponse {
    product_id: Option<i64>,
    price_override: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductResponse {
    base_price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InventoryResponse {
    #[serde(default)]
    stock_available: i64,
    #[serde(default)]
    stock_reserved: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdjustRequest {
    variant_id: VariantId,
    delta: i64,
}

/// HTTP client for the catalog service.
///
/// Price policy: the variant's override when present, else the product's
/// base price, else zero. Stock is `available - reserved`, floored at zero,
/// and zero when the inventory endpoint cannot be read.
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCatalogClient {
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> Result<Self, FulfillmentError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| FulfillmentError::Internal(format!("catalog client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        missing: &'static str,
    ) -> Result<T, FulfillmentError> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(|e| FulfillmentError::upstream(SERVICE, &e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(FulfillmentError::NotFound(missing));
        }
        let response = response
            .error_for_status()
            .map_err(|e| FulfillmentError::upstream(SERVICE, &e))?;
        response
            .json()
            .await
            .map_err(|e| FulfillmentError::upstream(SERVICE, &e))
    }

    async fn resolve_price(&self, variant: &VariantResponse) -> Result<Money, FulfillmentError> {
        let amount = match (variant.price_override, variant.product_id) {
            (Some(price), _) => price,
            (None, Some(product_id)) => {
                let product: ProductResponse = self
                    .get_json(&format!("/products/{product_id}"), "Product")
                    .await?;
                product.base_price.unwrap_or(Decimal::ZERO)
            }
            (None, None) => Decimal::ZERO,
        };
        Money::from_decimal(amount)
            .ok_or_else(|| FulfillmentError::Internal(format!("price out of range: {amount}")))
    }

    async fn available_stock(&self, variant_id: VariantId) -> u32 {
        match self
            .get_json::<InventoryResponse>(&format!("/inventory/by-variant/{variant_id}"), "Stock")
            .await
        {
            Ok(inventory) => {
                let free = (inventory.stock_available - inventory.stock_reserved).max(0);
                u32::try_from(free).unwrap_or(u32::MAX)
            }
            Err(e) => {
                tracing::debug!(%variant_id, error = %e, "stock unavailable, assuming none");
                0
            }
        }
    }
}

#[async_trait]
impl InventoryService for HttpCatalogClient {
    #[tracing::instrument(skip(self))]
    async fn get_variant(&self, variant_id: VariantId) -> Result<VariantSnapshot, FulfillmentError> {
        let variant: VariantResponse = self
            .get_json(&format!("/variants/{variant_id}"), "Variant")
            .await?;
        let price = self.resolve_price(&variant).await?;
        let available_stock = self.available_stock(variant_id).await;
        Ok(VariantSnapshot {
            variant_id,
            price,
            available_stock,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn adjust_stock(&self, variant_id: VariantId, delta: i64) -> Result<(), FulfillmentError> {
        let response = self
            .client
            .post(format!("{}/inventory/adjust", self.base_url))
            .json(&AdjustRequest { variant_id, delta })
            .send()
            .await
            .map_err(|e| FulfillmentError::upstream(SERVICE, &e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(%variant_id, delta, %status, %body, "stock adjustment rejected");
        match status {
            StatusCode::NOT_FOUND => Err(FulfillmentError::NotFound("Variant")),
            s if s.is_client_error() => Err(FulfillmentError::OutOfStock { variant_id }),
            s => Err(FulfillmentError::UpstreamUnavailable {
                service: SERVICE,
                message: format!("adjust returned {s}"),
                timed_out: s == StatusCode::GATEWAY_TIMEOUT,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reserve_and_restock() {
        let inventory =
            InMemoryInventoryService::new().with_variant(VariantId::new(10), Money::from_major(1000), 5);

        inventory.adjust_stock(VariantId::new(10), -2).await.unwrap();
        assert_eq!(inventory.stock_of(VariantId::new(10)), Some(3));

        inventory.adjust_stock(VariantId::new(10), 2).await.unwrap();
        assert_eq!(inventory.stock_of(VariantId::new(10)), Some(5));
        assert_eq!(inventory.adjustments().len(), 2);
    }

    #[tokio::test]
    async fn stock_never_goes_negative() {
        let inventory =
            InMemoryInventoryService::new().with_variant(VariantId::new(10), Money::from_major(1000), 1);

        let result = inventory.adjust_stock(VariantId::new(10), -2).await;
        assert!(matches!(result, Err(FulfillmentError::OutOfStock { .. })));
        assert_eq!(inventory.stock_of(VariantId::new(10)), Some(1));
        assert!(inventory.adjustments().is_empty());
    }

    #[tokio::test]
    async fn unreachable_fails_every_call() {
        let inventory =
            InMemoryInventoryService::new().with_variant(VariantId::new(10), Money::from_major(1000), 1);
        inventory.set_unreachable(true);

        assert!(inventory.get_variant(VariantId::new(10)).await.is_err());
        assert!(inventory.adjust_stock(VariantId::new(10), 1).await.is_err());
    }

    #[test]
    fn catalog_payloads_deserialize() {
        let variant: VariantResponse =
            serde_json::from_str(r#"{"id":10,"productId":3,"priceOverride":"14990.00"}"#).unwrap();
        assert_eq!(variant.product_id, Some(3));
        assert_eq!(variant.price_override, Some(Decimal::new(1499000, 2)));

        let inventory: InventoryResponse =
            serde_json::from_str(r#"{"stockAvailable":4,"stockReserved":6}"#).unwrap();
        assert_eq!((inventory.stock_available - inventory.stock_reserved).max(0), 0);
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = HttpCatalogClient::new(
            "http://catalog:8080/",
            Duration::from_secs(1),
            Duration::from_secs(2),
        )
        .unwrap();
        assert_eq!(client.base_url, "http://catalog:8080");
    }
}
