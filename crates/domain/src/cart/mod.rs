//! Per-user shopping cart.

mod aggregate;
mod events;

pub use aggregate::{CHECKOUT_CLAIM_TTL, Cart, CartLine, LineId, PendingCheckout};
pub use events::{
    CartCheckedOutData, CartClearedData, CartEvent, CartOpenedData, CheckoutClaimedData,
    CheckoutReleasedData, LineAddedData, LineQuantityChangedData, LineQuantityIncreasedData,
    LineRemovedData,
};

use common::AggregateId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CartError {
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: i64 },

    #[error("Cart line not found: {line_id}")]
    LineNotFound { line_id: LineId },

    #[error("Cart is empty")]
    Empty,

    #[error("Checkout {order_id} is already in progress for this cart")]
    CheckoutInProgress { order_id: AggregateId },

    #[error("Checkout {order_id} no longer holds this cart")]
    CheckoutNotClaimed { order_id: AggregateId },
}
