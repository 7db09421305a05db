//! Checkout log events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{DomainEvent, UserId, VariantId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CheckoutEvent {
    CheckoutStarted(CheckoutStartedData),

    /// One remote stock decrement went through.
    StockAdjusted(StockAdjustedData),

    CheckoutCompleted(CheckoutCompletedData),

    CheckoutFailed(CheckoutFailedData),
}

impl DomainEvent for CheckoutEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CheckoutEvent::CheckoutStarted(_) => "CheckoutStarted",
            CheckoutEvent::StockAdjusted(_) => "StockAdjusted",
            CheckoutEvent::CheckoutCompleted(_) => "CheckoutCompleted",
            CheckoutEvent::CheckoutFailed(_) => "CheckoutFailed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutStartedData {
    pub checkout_id: AggregateId,
    pub order_id: AggregateId,
    pub user_id: UserId,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustedData {
    pub variant_id: VariantId,
    pub delta: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutCompletedData {
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutFailedData {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

impl CheckoutEvent {
    pub fn checkout_started(
        checkout_id: AggregateId,
        order_id: AggregateId,
        user_id: UserId,
    ) -> Self {
        CheckoutEvent::CheckoutStarted(CheckoutStartedData {
            checkout_id,
            order_id,
            user_id,
            started_at: Utc::now(),
        })
    }

    pub fn stock_adjusted(variant_id: VariantId, delta: i64) -> Self {
        CheckoutEvent::StockAdjusted(StockAdjustedData { variant_id, delta })
    }

    pub fn checkout_completed() -> Self {
        CheckoutEvent::CheckoutCompleted(CheckoutCompletedData {
            completed_at: Utc::now(),
        })
    }

    pub fn checkout_failed(reason: impl Into<String>) -> Self {
        CheckoutEvent::CheckoutFailed(CheckoutFailedData {
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }
}
