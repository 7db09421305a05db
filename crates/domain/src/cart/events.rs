//! Cart domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::{Money, UserId, VariantId};

use super::{CartLine, LineId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartEvent {
    CartOpened(CartOpenedData),
    LineAdded(LineAddedData),
    LineQuantityIncreased(LineQuantityIncreasedData),
    LineQuantityChanged(LineQuantityChangedData),
    LineRemoved(LineRemovedData),
    CartCleared(CartClearedData),
    /// A checkout took the current lines. Further checkouts are refused
    /// until it completes or is released.
    CheckoutClaimed(CheckoutClaimedData),
    CheckoutReleased(CheckoutReleasedData),
    CartCheckedOut(CartCheckedOutData),
}

impl DomainEvent for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::CartOpened(_) => "CartOpened",
            CartEvent::LineAdded(_) => "LineAdded",
            CartEvent::LineQuantityIncreased(_) => "LineQuantityIncreased",
            CartEvent::LineQuantityChanged(_) => "LineQuantityChanged",
            CartEvent::LineRemoved(_) => "LineRemoved",
            CartEvent::CartCleared(_) => "CartCleared",
            CartEvent::CheckoutClaimed(_) => "CheckoutClaimed",
            CartEvent::CheckoutReleased(_) => "CheckoutReleased",
            CartEvent::CartCheckedOut(_) => "CartCheckedOut",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartOpenedData {
    pub cart_id: AggregateId,
    pub user_id: UserId,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineAddedData {
    pub line_id: LineId,
    pub variant_id: VariantId,
    pub quantity: u32,
    pub unit_price: Money,
    pub added_at: DateTime<Utc>,
}

/// Same variant added again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineQuantityIncreasedData {
    pub line_id: LineId,
    pub added: u32,
    /// Replaces the cached price when the catalog returned a positive one.
    pub unit_price: Option<Money>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineQuantityChangedData {
    pub line_id: LineId,
    pub quantity: u32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineRemovedData {
    pub line_id: LineId,
    pub removed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartClearedData {
    pub cleared_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutClaimedData {
    pub order_id: AggregateId,
    /// The lines as they were priced and ordered.
    pub lines: Vec<CartLine>,
    pub claimed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutReleasedData {
    pub order_id: AggregateId,
    pub released_at: DateTime<Utc>,
}

/// The claimed lines were drained into an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartCheckedOutData {
    pub order_id: AggregateId,
    pub checked_out_at: DateTime<Utc>,
}

impl CartEvent {
    pub fn cart_opened(cart_id: AggregateId, user_id: UserId) -> Self {
        CartEvent::CartOpened(CartOpenedData {
            cart_id,
            user_id,
            opened_at: Utc::now(),
        })
    }

    pub fn line_added(line_id: LineId, variant_id: VariantId, quantity: u32, unit_price: Money) -> Self {
        CartEvent::LineAdded(LineAddedData {
            line_id,
            variant_id,
            quantity,
            unit_price,
            added_at: Utc::now(),
        })
    }

    pub fn line_quantity_increased(line_id: LineId, added: u32, unit_price: Option<Money>) -> Self {
        CartEvent::LineQuantityIncreased(LineQuantityIncreasedData {
            line_id,
            added,
            unit_price,
            updated_at: Utc::now(),
        })
    }

    pub fn line_quantity_changed(line_id: LineId, quantity: u32) -> Self {
        CartEvent::LineQuantityChanged(LineQuantityChangedData {
            line_id,
            quantity,
            updated_at: Utc::now(),
        })
    }

    pub fn line_removed(line_id: LineId) -> Self {
        CartEvent::LineRemoved(LineRemovedData {
            line_id,
            removed_at: Utc::now(),
        })
    }

    pub fn cart_cleared() -> Self {
        CartEvent::CartCleared(CartClearedData {
            cleared_at: Utc::now(),
        })
    }

    pub fn checkout_claimed(order_id: AggregateId, lines: Vec<CartLine>, claimed_at: DateTime<Utc>) -> Self {
        CartEvent::CheckoutClaimed(CheckoutClaimedData {
            order_id,
            lines,
            claimed_at,
        })
    }

    pub fn checkout_released(order_id: AggregateId) -> Self {
        CartEvent::CheckoutReleased(CheckoutReleasedData {
            order_id,
            released_at: Utc::now(),
        })
    }

    pub fn cart_checked_out(order_id: AggregateId) -> Self {
        CartEvent::CartCheckedOut(CartCheckedOutData {
            order_id,
            checked_out_at: Utc::now(),
        })
    }
}
