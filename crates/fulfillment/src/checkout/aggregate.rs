//! Checkout log aggregate.

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{Aggregate, UserId};
use event_store::Version;

use super::events::{CheckoutEvent, StockAdjustedData};
use super::state::CheckoutState;
use crate::error::FulfillmentError;

/// Record of one checkout attempt and the stock decrements it applied.
///
/// Checkout does not undo decrements when a later line fails, so the log is
/// where the leftovers of a failed checkout can be found.
#[derive(Debug, Clone, Default)]
pub struct CheckoutLog {
    id: Option<AggregateId>,
    version: Version,
    order_id: Option<AggregateId>,
    user_id: Option<UserId>,
    state: CheckoutState,
    adjustments: Vec<StockAdjustedData>,
    failure_reason: Option<String>,
    started_at: Option<DateTime<Utc>>,
}

impl Aggregate for CheckoutLog {
    type Event = CheckoutEvent;
    type Error = FulfillmentError;

    fn aggregate_type() -> &'static str {
        "Checkout"
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
            CheckoutEvent::CheckoutStarted(data) => {
                self.id = Some(data.checkout_id);
                self.order_id = Some(data.order_id);
                self.user_id = Some(data.user_id);
                self.state = CheckoutState::AdjustingStock;
                self.started_at = Some(data.started_at);
            }
            CheckoutEvent::StockAdjusted(data) => {
                self.adjustments.push(data);
            }
            CheckoutEvent::CheckoutCompleted(_) => {
                self.state = CheckoutState::Completed;
            }
            CheckoutEvent::CheckoutFailed(data) => {
                self.state = CheckoutState::Failed;
                self.failure_reason = Some(data.reason);
            }
        }
    }
}

// Query methods
impl CheckoutLog {
    /// Log id for the checkout that allocated `order_id`.
    pub fn id_for(order_id: AggregateId) -> AggregateId {
        AggregateId::derived("checkout", order_id)
    }

    pub fn order_id(&self) -> Option<AggregateId> {
        self.order_id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn state(&self) -> CheckoutState {
        self.state
    }

    pub fn adjustments(&self) -> &[StockAdjustedData] {
        &self.adjustments
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::VariantId;

    #[test]
    fn failed_checkout_keeps_applied_adjustments() {
        let order_id = AggregateId::new();
        let mut log = CheckoutLog::default();
        log.apply_events([
            CheckoutEvent::checkout_started(CheckoutLog::id_for(order_id), order_id, UserId::new(4)),
            CheckoutEvent::stock_adjusted(VariantId::new(10), -2),
            CheckoutEvent::checkout_failed("Insufficient stock for variant 11"),
        ]);

        assert_eq!(log.id(), Some(CheckoutLog::id_for(order_id)));
        assert_eq!(log.state(), CheckoutState::Failed);
        assert_eq!(log.adjustments().len(), 1);
        assert_eq!(log.adjustments()[0].delta, -2);
        assert!(log.failure_reason().unwrap().contains("variant 11"));
    }

    #[test]
    fn completed_checkout() {
        let order_id = AggregateId::new();
        let mut log = CheckoutLog::default();
        log.apply_events([
            CheckoutEvent::checkout_started(CheckoutLog::id_for(order_id), order_id, UserId::new(4)),
            CheckoutEvent::checkout_completed(),
        ]);
        assert_eq!(log.state(), CheckoutState::Completed);
        assert_eq!(log.order_id(), Some(order_id));
    }
}
