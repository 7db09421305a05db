//! Settings that shape fulfillment behavior.

use domain::Money;

/// Domain-facing settings. The binary builds these from its environment
/// configuration.
#[derive(Debug, Clone)]
pub struct FulfillmentSettings {
    /// Fixed delivery price charged per order on a route.
    pub delivery_rate: Money,
    /// Whether shipments report delivery outcomes back to the order side.
    pub delivery_webhook_enabled: bool,
    /// Attempts for a write that loses a version race: cart edits, checkout
    /// claims, restock progress and route hand-over.
    pub write_attempts: u32,
    /// Capacity of the delivery-status notification queue.
    pub notifier_queue_capacity: usize,
}

impl Default for FulfillmentSettings {
    fn default() -> Self {
        Self {
            delivery_rate: Money::from_major(1900),
            delivery_webhook_enabled: true,
            write_attempts: 3,
            notifier_queue_capacity: 256,
        }
    }
}
