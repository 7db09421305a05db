//! Order status machine.

use serde::{Deserialize, Serialize};

/// Lifecycle of an order.
///
/// ```text
/// Created ──► Paid ──► Shipped
///    │          │
///    └──────────┴──► Cancelled
/// ```
/// Shipped and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Created,
    Paid,
    Cancelled,
    Shipped,
}

impl OrderStatus {
    pub fn can_pay(&self) -> bool {
        matches!(self, OrderStatus::Created)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Created | OrderStatus::Paid)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Shipped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Paid => "PAID",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Shipped => "SHIPPED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The owner cancelled; stock was restored.
    Customer,
    /// The courier reported a failed delivery; stock is not restored.
    DeliveryFailed,
}

/// Delivery outcome reported by the shipment side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryUpdate {
    Delivered,
    Failed,
}

impl DeliveryUpdate {
    /// Parses a reported status, ignoring case and surrounding whitespace.
    /// Statuses other than delivered and failed carry no order transition.
    pub fn parse(status: &str) -> Option<Self> {
        match status.trim().to_ascii_uppercase().as_str() {
            "DELIVERED" => Some(DeliveryUpdate::Delivered),
            "FAILED" => Some(DeliveryUpdate::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions() {
        assert!(OrderStatus::Created.can_pay());
        assert!(!OrderStatus::Paid.can_pay());
        assert!(OrderStatus::Paid.can_cancel());
        assert!(!OrderStatus::Shipped.can_cancel());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Created.is_terminal());
    }

    #[test]
    fn serializes_in_upper_case() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Created).unwrap(),
            "\"CREATED\""
        );
        assert_eq!(OrderStatus::Shipped.to_string(), "SHIPPED");
    }

    #[test]
    fn parses_delivery_updates() {
        assert_eq!(
            DeliveryUpdate::parse("  delivered "),
            Some(DeliveryUpdate::Delivered)
        );
        assert_eq!(DeliveryUpdate::parse("FAILED"), Some(DeliveryUpdate::Failed));
        assert_eq!(DeliveryUpdate::parse("IN_TRANSIT"), None);
    }
}
