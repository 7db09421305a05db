//! Order aggregate implementation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::value_objects::{Address, Money, UserId, VariantId};

use super::{
    CancelReason, DeliveryUpdate, OrderError, OrderEvent, OrderStatus, PaymentStatus,
    RestockAppliedData, RestockRevertedData,
};

/// Provider recorded when a payment names none.
pub const DEFAULT_PROVIDER: &str = "DEFAULT";

/// A line of an order. Prices are a snapshot taken at checkout and are never
/// revalidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub variant_id: VariantId,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

impl OrderItem {
    pub fn new(variant_id: VariantId, quantity: u32, unit_price: Money) -> Self {
        Self {
            variant_id,
            quantity,
            unit_price,
            line_total: unit_price.multiply(quantity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAttempt {
    pub provider: Option<String>,
    pub status: PaymentStatus,
    pub amount: Money,
    pub recorded_at: DateTime<Utc>,
}

/// Order aggregate root.
///
/// Created once from a cart with its address snapshot, items and total; only
/// the status changes afterwards. A customer cancellation first records the
/// restock of each item, so a cancel interrupted halfway can be finished
/// without restocking anything twice.
#[derive(Debug, Clone, Default)]
pub struct Order {
    id: Option<AggregateId>,
    version: Version,
    user_id: Option<UserId>,
    status: OrderStatus,
    shipping_address: Option<Address>,
    items: Vec<OrderItem>,
    total_amount: Money,
    payments: Vec<PaymentAttempt>,
    restocked: BTreeSet<usize>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderPlaced(data) => {
                self.id = Some(data.order_id);
                self.user_id = Some(data.user_id);
                self.status = OrderStatus::Created;
                self.shipping_address = Some(data.shipping_address);
                self.items = data.items;
                self.total_amount = data.total_amount;
                self.created_at = Some(data.placed_at);
                self.updated_at = Some(data.placed_at);
            }
            OrderEvent::PaymentRecorded(attempt) => {
                self.updated_at = Some(attempt.recorded_at);
                self.payments.push(attempt);
            }
            OrderEvent::OrderPaid(data) => {
                self.status = OrderStatus::Paid;
                self.updated_at = Some(data.paid_at);
            }
            OrderEvent::RestockApplied(data) => {
                self.restocked.insert(data.item_index);
                self.updated_at = Some(data.applied_at);
            }
            OrderEvent::RestockReverted(data) => {
                self.restocked.remove(&data.item_index);
                self.updated_at = Some(data.reverted_at);
            }
            OrderEvent::OrderCancelled(data) => {
                self.status = OrderStatus::Cancelled;
                self.updated_at = Some(data.cancelled_at);
            }
            OrderEvent::OrderShipped(data) => {
                self.status = OrderStatus::Shipped;
                self.updated_at = Some(data.shipped_at);
            }
        }
    }
}

// Query methods
impl Order {
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == Some(user_id)
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn shipping_address(&self) -> Option<&Address> {
        self.shipping_address.as_ref()
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn payments(&self) -> &[PaymentAttempt] {
        &self.payments
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_restocked(&self, item_index: usize) -> bool {
        self.restocked.contains(&item_index)
    }

    /// Some stock is back but the order is not cancelled yet.
    pub fn cancellation_in_progress(&self) -> bool {
        !self.restocked.is_empty() && self.status.can_cancel()
    }

    fn ensure_placed(&self) -> Result<(), OrderError> {
        match self.id {
            Some(_) => Ok(()),
            None => Err(OrderError::NotPlaced),
        }
    }
}

// Command methods (return events)
impl Order {
    /// Places the order and records a pending payment attempt.
    ///
    /// The total is the sum of the item line totals and is never recomputed.
    pub fn place(
        &self,
        order_id: AggregateId,
        user_id: UserId,
        shipping_address: Address,
        items: Vec<OrderItem>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyPlaced);
        }
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }

        let total_amount: Money = items.iter().map(|i| i.line_total).sum();
        Ok(vec![
            OrderEvent::order_placed(order_id, user_id, shipping_address, items, total_amount),
            OrderEvent::PaymentRecorded(PaymentAttempt {
                provider: None,
                status: PaymentStatus::Pending,
                amount: total_amount,
                recorded_at: Utc::now(),
            }),
        ])
    }

    /// Records an approved payment and marks the order paid.
    pub fn pay(&self, provider: Option<&str>) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if self.cancellation_in_progress() {
            return Err(OrderError::CancellationInProgress);
        }
        if !self.status.can_pay() {
            return Err(OrderError::InvalidStateTransition {
                current_status: self.status,
                action: "pay",
            });
        }

        let provider = provider
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PROVIDER)
            .to_string();

        Ok(vec![
            OrderEvent::PaymentRecorded(PaymentAttempt {
                provider: Some(provider.clone()),
                status: PaymentStatus::Approved,
                amount: self.total_amount,
                recorded_at: Utc::now(),
            }),
            OrderEvent::order_paid(provider),
        ])
    }

    /// Cancels on the owner's request. Cancelling a cancelled order is a no-op.
    pub fn cancel(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_cancellable()?;
        if self.status == OrderStatus::Cancelled {
            return Ok(vec![]);
        }
        Ok(vec![OrderEvent::order_cancelled(CancelReason::Customer)])
    }

    /// Fails unless the owner may still cancel: the order is placed and is
    /// not shipped.
    pub fn ensure_cancellable(&self) -> Result<(), OrderError> {
        self.ensure_placed()?;
        if self.status == OrderStatus::Cancelled || self.status.can_cancel() {
            return Ok(());
        }
        Err(OrderError::InvalidStateTransition {
            current_status: self.status,
            action: "cancel",
        })
    }

    /// Records that the stock of item `item_index` is being put back. Empty
    /// when it already was, or when the order is already cancelled, so only
    /// one writer restocks each item.
    pub fn apply_restock(&self, item_index: usize) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if self.status == OrderStatus::Cancelled {
            return Ok(vec![]);
        }
        if !self.status.can_cancel() {
            return Err(OrderError::InvalidStateTransition {
                current_status: self.status,
                action: "restock",
            });
        }
        let item = self
            .items
            .get(item_index)
            .ok_or(OrderError::UnknownItem { index: item_index })?;
        if self.is_restocked(item_index) {
            return Ok(vec![]);
        }
        Ok(vec![OrderEvent::RestockApplied(RestockAppliedData {
            item_index,
            variant_id: item.variant_id,
            quantity: item.quantity,
            applied_at: Utc::now(),
        })])
    }

    /// Marks the restock of `item_index` as outstanding again.
    pub fn revert_restock(&self, item_index: usize) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if !self.is_restocked(item_index) || !self.status.can_cancel() {
            return Ok(vec![]);
        }
        Ok(vec![OrderEvent::RestockReverted(RestockRevertedData {
            item_index,
            reverted_at: Utc::now(),
        })])
    }

    /// Applies a delivery outcome reported by the shipment side.
    ///
    /// Delivered ships the order, failed cancels it without restocking.
    /// Reporting the status the order already has is a no-op.
    pub fn apply_delivery(&self, update: DeliveryUpdate) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        let (target, action) = match update {
            DeliveryUpdate::Delivered => (OrderStatus::Shipped, "ship"),
            DeliveryUpdate::Failed => (OrderStatus::Cancelled, "fail delivery of"),
        };

        if self.status == target {
            return Ok(vec![]);
        }
        if update == DeliveryUpdate::Delivered && self.cancellation_in_progress() {
            return Err(OrderError::CancellationInProgress);
        }
        if !self.status.can_cancel() {
            return Err(OrderError::InvalidStateTransition {
                current_status: self.status,
                action,
            });
        }

        Ok(vec![match update {
            DeliveryUpdate::Delivered => OrderEvent::order_shipped(),
            DeliveryUpdate::Failed => OrderEvent::order_cancelled(CancelReason::DeliveryFailed),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> Address {
        Address {
            line1: "Los Leones 123".to_string(),
            line2: Some("Depto 4".to_string()),
            city: "Providencia".to_string(),
            state: Some("RM".to_string()),
            zip: None,
            country: "CL".to_string(),
        }
    }

    fn placed_order() -> Order {
        let mut order = Order::default();
        let events = order
            .place(
                AggregateId::new(),
                UserId::new(5),
                address(),
                vec![OrderItem::new(VariantId::new(10), 2, Money::from_major(1000))],
            )
            .unwrap();
        order.apply_events(events);
        order
    }

    #[test]
    fn place_fixes_total_and_records_pending_payment() {
        let order = placed_order();

        assert_eq!(order.status(), OrderStatus::Created);
        assert_eq!(order.total_amount(), Money::from_major(2000));
        assert_eq!(order.items()[0].line_total, Money::from_major(2000));
        assert_eq!(order.payments().len(), 1);
        assert_eq!(order.payments()[0].status, PaymentStatus::Pending);
        assert!(order.payments()[0].provider.is_none());
        assert!(order.is_owned_by(UserId::new(5)));
    }

    #[test]
    fn place_requires_items() {
        let result = Order::default().place(AggregateId::new(), UserId::new(5), address(), vec![]);
        assert!(matches!(result, Err(OrderError::NoItems)));
    }

    #[test]
    fn pay_only_from_created() {
        let mut order = placed_order();
        order.apply_events(order.pay(None).unwrap());

        assert_eq!(order.status(), OrderStatus::Paid);
        let approved = &order.payments()[1];
        assert_eq!(approved.status, PaymentStatus::Approved);
        assert_eq!(approved.provider.as_deref(), Some(DEFAULT_PROVIDER));

        assert!(matches!(
            order.pay(Some("webpay")),
            Err(OrderError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut order = placed_order();
        order.apply_events(order.cancel().unwrap());
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert!(order.cancel().unwrap().is_empty());
    }

    #[test]
    fn restock_is_recorded_once_per_item() {
        let mut order = placed_order();
        order.apply_events(order.apply_restock(0).unwrap());

        assert!(order.is_restocked(0));
        assert!(order.cancellation_in_progress());
        assert!(order.apply_restock(0).unwrap().is_empty());
        assert!(matches!(
            order.apply_restock(1),
            Err(OrderError::UnknownItem { index: 1 })
        ));
        assert!(matches!(order.pay(None), Err(OrderError::CancellationInProgress)));

        order.apply_events(order.revert_restock(0).unwrap());
        assert!(!order.is_restocked(0));
        assert!(!order.cancellation_in_progress());

        order.apply_events(order.apply_restock(0).unwrap());
        order.apply_events(order.cancel().unwrap());
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert!(!order.cancellation_in_progress());
        assert!(order.apply_restock(0).unwrap().is_empty());
        assert!(order.revert_restock(0).unwrap().is_empty());
    }

    #[test]
    fn shipped_order_cannot_be_cancelled() {
        let mut order = placed_order();
        order.apply_events(order.apply_delivery(DeliveryUpdate::Delivered).unwrap());
        assert_eq!(order.status(), OrderStatus::Shipped);
        assert!(order.cancel().is_err());
        assert!(order.ensure_cancellable().is_err());
        assert!(order.apply_restock(0).is_err());
    }

    #[test]
    fn failed_delivery_cancels() {
        let mut order = placed_order();
        order.apply_events(order.pay(Some("webpay")).unwrap());
        order.apply_events(order.apply_delivery(DeliveryUpdate::Failed).unwrap());
        assert_eq!(order.status(), OrderStatus::Cancelled);

        // Repeated report is a no-op.
        assert!(
            order
                .apply_delivery(DeliveryUpdate::Failed)
                .unwrap()
                .is_empty()
        );
        // Cancelled orders never ship.
        assert!(order.apply_delivery(DeliveryUpdate::Delivered).is_err());
    }

    #[test]
    fn commands_on_missing_order_fail() {
        assert!(matches!(Order::default().pay(None), Err(OrderError::NotPlaced)));
    }
}
