use serde::{Deserialize, Serialize};

use super::ShipmentError;

/// Delivery status of a shipment.
///
/// ```text
/// PendingPickup ──► Assigned ──► InTransit ──┬──► Delivered
///       │              │             │       └──► Failed
///       └──────────────┴─────────────┴──► Cancelled
/// ```
/// `Returned` exists for compatibility with the order side and is never
/// entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    #[default]
    PendingPickup,
    Assigned,
    InTransit,
    Delivered,
    Failed,
    Returned,
    Cancelled,
}

impl DeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Delivered
                | DeliveryStatus::Failed
                | DeliveryStatus::Returned
                | DeliveryStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::PendingPickup => "PENDING_PICKUP",
            DeliveryStatus::Assigned => "ASSIGNED",
            DeliveryStatus::InTransit => "IN_TRANSIT",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Failed => "FAILED",
            DeliveryStatus::Returned => "RETURNED",
            DeliveryStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = ShipmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING_PICKUP" => Ok(DeliveryStatus::PendingPickup),
            "ASSIGNED" => Ok(DeliveryStatus::Assigned),
            "IN_TRANSIT" => Ok(DeliveryStatus::InTransit),
            "DELIVERED" => Ok(DeliveryStatus::Delivered),
            "FAILED" => Ok(DeliveryStatus::Failed),
            "RETURNED" => Ok(DeliveryStatus::Returned),
            "CANCELLED" => Ok(DeliveryStatus::Cancelled),
            _ => Err(ShipmentError::UnknownStatus(s.to_string())),
        }
    }
}
