//! Order lifecycle: payment, cancellation with restock, delivery outcomes.

use std::sync::Arc;

use common::AggregateId;
use domain::{Aggregate, CommandHandler, DeliveryUpdate, Order, OrderStatus};
use event_store::EventStore;

use crate::caller::Caller;
use crate::error::{FulfillmentError, Result};
use crate::retry::execute_retrying;
use crate::services::InventoryService;
use crate::settings::FulfillmentSettings;
use crate::views::{DeliveryInfo, OrderItemView, OrderView};

/// Application service for placed orders.
///
/// Orders are private to their owner: any other caller gets `NotFound`, the
/// same as for a missing order. Admins may read any order.
pub struct OrderService<S: EventStore> {
    handler: CommandHandler<S, Order>,
    inventory: Arc<dyn InventoryService>,
    write_attempts: u32,
}

impl<S: EventStore + Clone> Clone for OrderService<S> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            inventory: Arc::clone(&self.inventory),
            write_attempts: self.write_attempts,
        }
    }
}

impl<S: EventStore + Clone> OrderService<S> {
    pub fn new(
        store: S,
        inventory: Arc<dyn InventoryService>,
        settings: &FulfillmentSettings,
    ) -> Self {
        Self {
            handler: CommandHandler::new(store),
            inventory,
            write_attempts: settings.write_attempts,
        }
    }

    async fn load_visible(&self, caller: &Caller, order_id: AggregateId) -> Result<Order> {
        let order = self
            .handler
            .load_existing(order_id)
            .await?
            .ok_or(FulfillmentError::NotFound("Order"))?;
        if caller.is_admin || order.is_owned_by(caller.user_id) {
            Ok(order)
        } else {
            Err(FulfillmentError::NotFound("Order"))
        }
    }

    async fn load_owned(&self, caller: &Caller, order_id: AggregateId) -> Result<Order> {
        let order = self.load_visible(caller, order_id).await?;
        if !order.is_owned_by(caller.user_id) {
            return Err(FulfillmentError::NotFound("Order"));
        }
        Ok(order)
    }

    pub async fn get(&self, caller: &Caller, order_id: AggregateId) -> Result<OrderView> {
        let order = self.load_visible(caller, order_id).await?;
        Ok(OrderView::new(order_id, &order))
    }

    /// The caller's orders, newest first.
    pub async fn list_for_user(&self, caller: &Caller) -> Result<Vec<OrderView>> {
        let mut orders: Vec<Order> = self
            .handler
            .load_all()
            .await?
            .into_iter()
            .filter(|o| o.is_owned_by(caller.user_id))
            .collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(orders
            .iter()
            .filter_map(|o| o.id().map(|id| OrderView::new(id, o)))
            .collect())
    }

    /// Records an approved payment. Only a freshly created order can be paid.
    #[tracing::instrument(skip(self), fields(user = %caller.user_id))]
    pub async fn pay(
        &self,
        caller: &Caller,
        order_id: AggregateId,
        provider: Option<String>,
    ) -> Result<OrderView> {
        self.load_owned(caller, order_id).await?;
        let result = self
            .handler
            .execute_as(order_id, caller.actor(), |order| order.pay(provider.as_deref()))
            .await?;

        metrics::counter!("order_paid_total").increment(1);
        tracing::info!(%order_id, "order paid");
        Ok(OrderView::new(order_id, &result.aggregate))
    }

    /// Puts every item's stock back, then cancels the order.
    ///
    /// Each restock is recorded on the order before the catalog is called,
    /// so concurrent or repeated cancels restock an item once. A restock the
    /// catalog refuses is marked outstanding again and its error returned;
    /// the order stays uncancelled and the next cancel finishes only the
    /// outstanding items. Cancelling a cancelled order changes nothing.
    #[tracing::instrument(skip(self), fields(user = %caller.user_id))]
    pub async fn cancel(&self, caller: &Caller, order_id: AggregateId) -> Result<OrderView> {
        let order = self.load_owned(caller, order_id).await?;
        order.ensure_cancellable()?;
        if order.status() == OrderStatus::Cancelled {
            return Ok(OrderView::new(order_id, &order));
        }

        for (index, item) in order.items().iter().enumerate() {
            let recorded = execute_retrying(
                &self.handler,
                order_id,
                caller.actor(),
                self.write_attempts,
                |order| order.apply_restock(index),
            )
            .await?;
            if recorded.events.is_empty() {
                continue;
            }

            let quantity = i64::from(item.quantity);
            if let Err(e) = self.inventory.adjust_stock(item.variant_id, quantity).await {
                metrics::counter!("order_restock_failed_total").increment(1);
                tracing::warn!(
                    %order_id,
                    variant_id = %item.variant_id,
                    quantity,
                    error = %e,
                    "restock failed, cancellation left outstanding"
                );
                self.mark_outstanding(caller, order_id, index).await;
                return Err(e);
            }
        }

        let result = execute_retrying(
            &self.handler,
            order_id,
            caller.actor(),
            self.write_attempts,
            |order| order.cancel(),
        )
        .await?;

        if !result.events.is_empty() {
            metrics::counter!("order_cancelled_total").increment(1);
            tracing::info!(%order_id, "order cancelled");
        }
        Ok(OrderView::new(order_id, &result.aggregate))
    }

    async fn mark_outstanding(&self, caller: &Caller, order_id: AggregateId, index: usize) {
        if let Err(e) = execute_retrying(
            &self.handler,
            order_id,
            caller.actor(),
            self.write_attempts,
            |order| order.revert_restock(index),
        )
        .await
        {
            tracing::error!(%order_id, item = index, error = %e, "could not mark restock outstanding");
        }
    }

    /// Applies a delivery outcome reported by the shipment side.
    ///
    /// `DELIVERED` ships the order and `FAILED` cancels it without restock.
    /// Any other status is ignored. Returns whether the order changed.
    #[tracing::instrument(skip(self, note))]
    pub async fn apply_delivery_status(
        &self,
        order_id: AggregateId,
        status: &str,
        note: Option<&str>,
    ) -> Result<bool> {
        if self.handler.load_existing(order_id).await?.is_none() {
            return Err(FulfillmentError::NotFound("Order"));
        }
        let Some(update) = DeliveryUpdate::parse(status) else {
            tracing::debug!(%order_id, status, "delivery status carries no order transition");
            return Ok(false);
        };

        let result = self
            .handler
            .execute(order_id, |order| order.apply_delivery(update))
            .await?;
        if !result.events.is_empty() {
            tracing::info!(%order_id, status = %result.aggregate.status(), note, "delivery outcome applied");
        }
        Ok(!result.events.is_empty())
    }

    /// Order data the delivery side needs to create a shipment.
    pub async fn delivery_info(&self, order_id: AggregateId) -> Result<DeliveryInfo> {
        let order = self
            .handler
            .load_existing(order_id)
            .await?
            .ok_or(FulfillmentError::NotFound("Order"))?;
        let (Some(user_id), Some(address)) = (order.user_id(), order.shipping_address()) else {
            return Err(FulfillmentError::NotFound("Order"));
        };
        Ok(DeliveryInfo {
            order_id,
            user_id,
            status: order.status(),
            total_amount: order.total_amount().to_decimal(),
            shipping_address: address.clone(),
            items: order.items().iter().map(OrderItemView::from).collect(),
        })
    }
}
