//! Order domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::{Address, Money, UserId, VariantId};

use super::{CancelReason, OrderItem, PaymentAttempt};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was created from a cart, with prices and total fixed.
    OrderPlaced(OrderPlacedData),

    /// A payment attempt was recorded. Attempts are never changed.
    PaymentRecorded(PaymentAttempt),

    OrderPaid(OrderPaidData),

    /// One item's stock is being put back ahead of a cancellation.
    RestockApplied(RestockAppliedData),

    /// The restock of one item did not go through and is outstanding again.
    RestockReverted(RestockRevertedData),

    OrderCancelled(OrderCancelledData),

    /// The courier delivered the order.
    OrderShipped(OrderShippedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::PaymentRecorded(_) => "PaymentRecorded",
            OrderEvent::OrderPaid(_) => "OrderPaid",
            OrderEvent::RestockApplied(_) => "RestockApplied",
            OrderEvent::RestockReverted(_) => "RestockReverted",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
            OrderEvent::OrderShipped(_) => "OrderShipped",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: AggregateId,
    pub user_id: UserId,
    pub shipping_address: Address,
    pub items: Vec<OrderItem>,
    pub total_amount: Money,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPaidData {
    pub provider: String,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestockAppliedData {
    /// Position of the item in the order.
    pub item_index: usize,
    pub variant_id: VariantId,
    pub quantity: u32,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestockRevertedData {
    pub item_index: usize,
    pub reverted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub reason: CancelReason,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderShippedData {
    pub shipped_at: DateTime<Utc>,
}

impl OrderEvent {
    pub fn order_placed(
        order_id: AggregateId,
        user_id: UserId,
        shipping_address: Address,
        items: Vec<OrderItem>,
        total_amount: Money,
    ) -> Self {
        OrderEvent::OrderPlaced(OrderPlacedData {
            order_id,
            user_id,
            shipping_address,
            items,
            total_amount,
            placed_at: Utc::now(),
        })
    }

    pub fn order_paid(provider: impl Into<String>) -> Self {
        OrderEvent::OrderPaid(OrderPaidData {
            provider: provider.into(),
            paid_at: Utc::now(),
        })
    }

    pub fn order_cancelled(reason: CancelReason) -> Self {
        OrderEvent::OrderCancelled(OrderCancelledData {
            reason,
            cancelled_at: Utc::now(),
        })
    }

    pub fn order_shipped() -> Self {
        OrderEvent::OrderShipped(OrderShippedData {
            shipped_at: Utc::now(),
        })
    }
}
