//! Cart-to-order checkout.

use std::sync::Arc;

use chrono::Utc;
use common::AggregateId;
use domain::{
    Address, AddressId, Aggregate, Cart, CartError, CartLine, CommandHandler, DomainError,
    DomainEvent, Order, OrderItem, UserId,
};
use event_store::{AppendOptions, EventEnvelope, EventStore, Version};

use super::aggregate::CheckoutLog;
use super::events::CheckoutEvent;
use crate::addresses::AddressService;
use crate::error::{FulfillmentError, Result};
use crate::retry::execute_retrying;
use crate::services::InventoryService;
use crate::settings::FulfillmentSettings;
use crate::views::OrderView;

/// Turns a user's cart into an order.
///
/// Steps, in order:
/// 1. claim the cart's current lines with a version-checked append, so a
///    second checkout of the same cart fails before any stock moves
/// 2. price every claimed line at the catalog's current price, falling back
///    to the price cached in the cart only when the catalog cannot be reached
/// 3. decrement remote stock line by line, each decrement logged
/// 4. place the order with a pending payment and drain the claimed lines
///
/// A failure before step 4 releases the claim, leaves the cart as it was and
/// persists no order. Decrements already applied stay applied; the checkout
/// log shows them.
pub struct CheckoutService<S: EventStore> {
    store: S,
    carts: CommandHandler<S, Cart>,
    orders: CommandHandler<S, Order>,
    logs: CommandHandler<S, CheckoutLog>,
    addresses: AddressService<S>,
    inventory: Arc<dyn InventoryService>,
    write_attempts: u32,
}

impl<S: EventStore + Clone> Clone for CheckoutService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            carts: self.carts.clone(),
            orders: self.orders.clone(),
            logs: self.logs.clone(),
            addresses: self.addresses.clone(),
            inventory: Arc::clone(&self.inventory),
            write_attempts: self.write_attempts,
        }
    }
}

impl<S: EventStore + Clone> CheckoutService<S> {
    pub fn new(
        store: S,
        inventory: Arc<dyn InventoryService>,
        settings: &FulfillmentSettings,
    ) -> Self {
        Self {
            carts: CommandHandler::new(store.clone()),
            orders: CommandHandler::new(store.clone()),
            logs: CommandHandler::new(store.clone()),
            addresses: AddressService::new(store.clone()),
            store,
            inventory,
            write_attempts: settings.write_attempts,
        }
    }

    #[tracing::instrument(skip(self), fields(user = %user_id))]
    pub async fn checkout(&self, user_id: UserId, address_id: AddressId) -> Result<OrderView> {
        let started = std::time::Instant::now();
        let result = self.run(user_id, address_id).await;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(view) => {
                metrics::counter!("checkout_total").increment(1);
                tracing::info!(order_id = %view.id, total = %view.total_amount, "checkout completed");
            }
            Err(e) => {
                metrics::counter!("checkout_failed").increment(1);
                tracing::warn!(error = %e, "checkout failed");
            }
        }
        result
    }

    async fn run(&self, user_id: UserId, address_id: AddressId) -> Result<OrderView> {
        // 1. Preconditions
        let cart = self.carts.load(Cart::id_for(user_id)).await?;
        if cart.is_empty() {
            return Err(FulfillmentError::EmptyCart);
        }
        let address = self
            .addresses
            .find(user_id, address_id)
            .await?
            .ok_or_else(|| {
                FulfillmentError::InvalidAddress(format!("address {address_id} not found"))
            })?
            .address;

        // 2. Claim
        let order_id = AggregateId::new();
        let lines = self.claim(user_id, order_id).await?;

        match self.place(user_id, order_id, address, &lines).await {
            Ok(view) => Ok(view),
            Err(e) => {
                self.release(user_id, order_id).await;
                Err(e)
            }
        }
    }

    /// Takes the cart's lines for `order_id`. Another live checkout of the
    /// same cart makes this fail with a conflict.
    async fn claim(&self, user_id: UserId, order_id: AggregateId) -> Result<Vec<CartLine>> {
        let claimed = execute_retrying(
            &self.carts,
            Cart::id_for(user_id),
            Some(user_id.to_string()),
            self.write_attempts,
            |cart| cart.claim_checkout(order_id, Utc::now()),
        )
        .await
        .map_err(|e| match e {
            FulfillmentError::Domain(DomainError::Cart(CartError::Empty)) => {
                FulfillmentError::EmptyCart
            }
            other => other,
        })?;

        claimed
            .aggregate
            .pending_checkout()
            .filter(|pending| pending.order_id == order_id)
            .map(|pending| pending.lines.clone())
            .ok_or_else(|| FulfillmentError::Internal(format!("claim for {order_id} not recorded")))
    }

    async fn release(&self, user_id: UserId, order_id: AggregateId) {
        if let Err(e) = execute_retrying(
            &self.carts,
            Cart::id_for(user_id),
            Some(user_id.to_string()),
            self.write_attempts,
            |cart| cart.release_checkout(order_id),
        )
        .await
        {
            metrics::counter!("checkout_release_failed_total").increment(1);
            tracing::error!(%order_id, error = %e, "could not release cart claim");
        }
    }

    async fn place(
        &self,
        user_id: UserId,
        order_id: AggregateId,
        address: Address,
        lines: &[CartLine],
    ) -> Result<OrderView> {
        // 3. Authoritative prices
        let items = self.price_lines(lines).await?;

        // 4. Stock, one decrement per line
        let log_id = CheckoutLog::id_for(order_id);
        let mut version = Version::initial();
        version = self
            .append_log_event(log_id, version, &CheckoutEvent::checkout_started(log_id, order_id, user_id))
            .await?;

        for item in &items {
            let delta = -i64::from(item.quantity);
            if let Err(e) = self.inventory.adjust_stock(item.variant_id, delta).await {
                tracing::warn!(%order_id, variant_id = %item.variant_id, error = %e, "stock step failed");
                self.append_log_event(log_id, version, &CheckoutEvent::checkout_failed(e.to_string()))
                    .await?;
                return Err(e);
            }
            version = self
                .append_log_event(log_id, version, &CheckoutEvent::stock_adjusted(item.variant_id, delta))
                .await?;
        }

        // 5. Order, pending payment, drained cart
        let placed = match self
            .orders
            .execute_as(order_id, Some(user_id.to_string()), |order| {
                order.place(order_id, user_id, address, items)
            })
            .await
        {
            Ok(placed) => placed,
            Err(e) => {
                self.append_log_event(log_id, version, &CheckoutEvent::checkout_failed(e.to_string()))
                    .await?;
                return Err(e.into());
            }
        };

        // The order stands from here on. A drain that still fails leaves the
        // claim to expire; it is logged, not reported.
        if let Err(e) = execute_retrying(
            &self.carts,
            Cart::id_for(user_id),
            Some(user_id.to_string()),
            self.write_attempts,
            |cart| cart.complete_checkout(order_id),
        )
        .await
        {
            metrics::counter!("checkout_drain_failed_total").increment(1);
            tracing::error!(%order_id, error = %e, "order placed but cart not drained");
        }
        self.append_log_event(log_id, version, &CheckoutEvent::checkout_completed())
            .await?;

        Ok(OrderView::new(order_id, &placed.aggregate))
    }

    /// Prices each claimed line at the catalog's answer. The cached cart
    /// price is used only when the catalog call fails. A line that ends up
    /// priced zero is rejected before any stock moves.
    async fn price_lines(&self, lines: &[CartLine]) -> Result<Vec<OrderItem>> {
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let price = match self.inventory.get_variant(line.variant_id).await {
                Ok(snapshot) => snapshot.price,
                Err(e) => {
                    tracing::warn!(variant_id = %line.variant_id, error = %e, "using cached cart price");
                    line.unit_price
                }
            };
            if !price.is_positive() {
                return Err(FulfillmentError::validation(format!(
                    "variant {} has no price",
                    line.variant_id
                )));
            }
            items.push(OrderItem::new(line.variant_id, line.quantity, price));
        }
        Ok(items)
    }

    /// Log of the checkout that allocated `order_id`.
    pub async fn log_for_order(&self, order_id: AggregateId) -> Result<Option<CheckoutLog>> {
        Ok(self.logs.load_existing(CheckoutLog::id_for(order_id)).await?)
    }

    /// Every checkout log, oldest first.
    pub async fn logs(&self) -> Result<Vec<CheckoutLog>> {
        Ok(self.logs.load_all().await?)
    }

    async fn append_log_event(
        &self,
        log_id: AggregateId,
        current_version: Version,
        event: &CheckoutEvent,
    ) -> Result<Version> {
        let envelope = EventEnvelope::builder()
            .event_type(event.event_type())
            .aggregate_id(log_id)
            .aggregate_type(CheckoutLog::aggregate_type())
            .version(current_version.next())
            .payload(event)?
            .build()?;

        Ok(self
            .store
            .append(vec![envelope], AppendOptions::expect_version(current_version))
            .await?)
    }
}
