//! Order aggregate and related types.

mod aggregate;
mod events;
mod state;

pub use aggregate::{Order, OrderItem, PaymentAttempt};
pub use events::{
    OrderCancelledData, OrderEvent, OrderPaidData, OrderPlacedData, OrderShippedData,
    RestockAppliedData, RestockRevertedData,
};
pub use state::{CancelReason, DeliveryUpdate, OrderStatus, PaymentStatus};

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Invalid state transition: cannot {action} from {current_status} state")]
    InvalidStateTransition {
        current_status: OrderStatus,
        action: &'static str,
    },

    #[error("Order has no items")]
    NoItems,

    #[error("Order already placed")]
    AlreadyPlaced,

    #[error("Order not found")]
    NotPlaced,

    #[error("Order has no item at position {index}")]
    UnknownItem { index: usize },

    #[error("Order is being cancelled")]
    CancellationInProgress,
}
