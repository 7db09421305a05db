//! Checkout: cart to order with a logged stock step.

mod aggregate;
mod coordinator;
mod events;
mod state;

pub use aggregate::CheckoutLog;
pub use coordinator::CheckoutService;
pub use events::{
    CheckoutCompletedData, CheckoutEvent, CheckoutFailedData, CheckoutStartedData,
    StockAdjustedData,
};
pub use state::CheckoutState;
