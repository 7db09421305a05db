//! Checkout log state machine.

use serde::{Deserialize, Serialize};

/// The state of one checkout attempt.
///
/// ```text
/// NotStarted ──► AdjustingStock ──┬──► Completed
///                                 └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CheckoutState {
    #[default]
    NotStarted,

    /// Stock is being decremented line by line.
    AdjustingStock,

    /// The order was placed and the cart drained (terminal).
    Completed,

    /// A step failed; decrements recorded so far were not reversed (terminal).
    Failed,
}

impl CheckoutState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckoutState::Completed | CheckoutState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::NotStarted => "NotStarted",
            CheckoutState::AdjustingStock => "AdjustingStock",
            CheckoutState::Completed => "Completed",
            CheckoutState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
