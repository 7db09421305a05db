//! Cart aggregate implementation.

use chrono::{DateTime, TimeDelta, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::value_objects::{Money, UserId, VariantId};

use super::{CartError, CartEvent};

/// Identifier of a line within one cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(u32);

impl LineId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for LineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: LineId,
    pub variant_id: VariantId,
    pub quantity: u32,
    /// Price cached when the line was last added to.
    pub unit_price: Money,
}

impl CartLine {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// How long a checkout holds the cart before another checkout may take it
/// over. Covers a checkout whose process died before completing or
/// releasing its claim.
pub const CHECKOUT_CLAIM_TTL: TimeDelta = TimeDelta::minutes(5);

/// Lines taken by a running checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCheckout {
    pub order_id: AggregateId,
    pub lines: Vec<CartLine>,
    pub claimed_at: DateTime<Utc>,
}

impl PendingCheckout {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.claimed_at + CHECKOUT_CLAIM_TTL
    }
}

/// A user's cart.
///
/// There is exactly one per user: its id is derived from the user id, so
/// concurrent first requests land on the same stream. Lines are unique per
/// variant and never sit at quantity zero.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    id: Option<AggregateId>,
    version: Version,
    user_id: Option<UserId>,
    lines: Vec<CartLine>,
    next_line_id: u32,
    pending_checkout: Option<PendingCheckout>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Aggregate for Cart {
    type Event = CartEvent;
    type Error = CartError;

    fn aggregate_type() -> &'static str {
        "Cart"
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
            CartEvent::CartOpened(data) => {
                self.id = Some(data.cart_id);
                self.user_id = Some(data.user_id);
                self.next_line_id = 1;
                self.created_at = Some(data.opened_at);
                self.updated_at = Some(data.opened_at);
            }
            CartEvent::LineAdded(data) => {
                self.lines.push(CartLine {
                    id: data.line_id,
                    variant_id: data.variant_id,
                    quantity: data.quantity,
                    unit_price: data.unit_price,
                });
                self.next_line_id = self.next_line_id.max(data.line_id.as_u32() + 1);
                self.updated_at = Some(data.added_at);
            }
            CartEvent::LineQuantityIncreased(data) => {
                if let Some(line) = self.line_mut(data.line_id) {
                    line.quantity += data.added;
                    if let Some(price) = data.unit_price {
                        line.unit_price = price;
                    }
                }
                self.updated_at = Some(data.updated_at);
            }
            CartEvent::LineQuantityChanged(data) => {
                if let Some(line) = self.line_mut(data.line_id) {
                    line.quantity = data.quantity;
                }
                self.updated_at = Some(data.updated_at);
            }
            CartEvent::LineRemoved(data) => {
                self.lines.retain(|l| l.id != data.line_id);
                self.updated_at = Some(data.removed_at);
            }
            CartEvent::CartCleared(data) => {
                self.lines.clear();
                self.updated_at = Some(data.cleared_at);
            }
            CartEvent::CheckoutClaimed(data) => {
                self.pending_checkout = Some(PendingCheckout {
                    order_id: data.order_id,
                    lines: data.lines,
                    claimed_at: data.claimed_at,
                });
            }
            CartEvent::CheckoutReleased(data) => {
                if self.pending_order() == Some(data.order_id) {
                    self.pending_checkout = None;
                }
            }
            CartEvent::CartCheckedOut(data) => {
                match self.pending_checkout.take() {
                    Some(pending) if pending.order_id == data.order_id => {
                        self.drain(&pending.lines);
                    }
                    other => {
                        self.pending_checkout = other;
                        self.lines.clear();
                    }
                }
                self.updated_at = Some(data.checked_out_at);
            }
        }
    }
}

// Query methods
impl Cart {
    /// Stream id of the cart belonging to `user_id`.
    pub fn id_for(user_id: UserId) -> AggregateId {
        AggregateId::derived("cart", user_id)
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, line_id: LineId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }

    pub fn line_for_variant(&self, variant_id: VariantId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.variant_id == variant_id)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn pending_checkout(&self) -> Option<&PendingCheckout> {
        self.pending_checkout.as_ref()
    }

    fn pending_order(&self) -> Option<AggregateId> {
        self.pending_checkout.as_ref().map(|p| p.order_id)
    }

    /// Σ unit price × quantity, computed from the current lines.
    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    fn line_mut(&mut self, line_id: LineId) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|l| l.id == line_id)
    }

    /// Takes the ordered quantities out of the lines. Anything added after
    /// the claim stays in the cart.
    fn drain(&mut self, ordered: &[CartLine]) {
        for taken in ordered {
            if let Some(line) = self.line_mut(taken.id) {
                line.quantity = line.quantity.saturating_sub(taken.quantity);
            }
        }
        self.lines.retain(|l| l.quantity > 0);
    }

    fn validate_quantity(quantity: i64) -> Result<u32, CartError> {
        u32::try_from(quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or(CartError::InvalidQuantity { quantity })
    }
}

// Command methods (return events)
impl Cart {
    /// Opens the cart if it has never been used. Idempotent.
    pub fn open(&self, user_id: UserId) -> Result<Vec<CartEvent>, CartError> {
        if self.id.is_some() {
            return Ok(vec![]);
        }
        Ok(vec![CartEvent::cart_opened(Self::id_for(user_id), user_id)])
    }

    /// Adds `quantity` of a variant.
    ///
    /// An existing line for the variant grows, and its cached price is
    /// replaced only when `fetched_price` is positive. A new line caches
    /// `fetched_price` as is, zero included.
    pub fn add_item(
        &self,
        user_id: UserId,
        variant_id: VariantId,
        quantity: i64,
        fetched_price: Money,
    ) -> Result<Vec<CartEvent>, CartError> {
        let quantity = Self::validate_quantity(quantity)?;
        let mut events = self.open(user_id)?;

        match self.line_for_variant(variant_id) {
            Some(line) => events.push(CartEvent::line_quantity_increased(
                line.id,
                quantity,
                fetched_price.is_positive().then_some(fetched_price),
            )),
            None => events.push(CartEvent::line_added(
                LineId::new(self.next_line_id.max(1)),
                variant_id,
                quantity,
                fetched_price,
            )),
        }

        Ok(events)
    }

    /// Replaces the quantity of a line.
    pub fn update_quantity(&self, line_id: LineId, quantity: i64) -> Result<Vec<CartEvent>, CartError> {
        let quantity = Self::validate_quantity(quantity)?;
        if self.line(line_id).is_none() {
            return Err(CartError::LineNotFound { line_id });
        }
        Ok(vec![CartEvent::line_quantity_changed(line_id, quantity)])
    }

    pub fn remove_line(&self, line_id: LineId) -> Result<Vec<CartEvent>, CartError> {
        if self.line(line_id).is_none() {
            return Err(CartError::LineNotFound { line_id });
        }
        Ok(vec![CartEvent::line_removed(line_id)])
    }

    /// Removes the line holding `variant_id`, if any.
    pub fn remove_variant(&self, variant_id: VariantId) -> Result<Vec<CartEvent>, CartError> {
        Ok(self
            .line_for_variant(variant_id)
            .map(|line| CartEvent::line_removed(line.id))
            .into_iter()
            .collect())
    }

    pub fn clear(&self) -> Result<Vec<CartEvent>, CartError> {
        if self.lines.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![CartEvent::cart_cleared()])
    }

    /// Takes the current lines for the checkout that will place `order_id`.
    ///
    /// Refused while another checkout holds a live claim. A claim older than
    /// [`CHECKOUT_CLAIM_TTL`] is taken over.
    pub fn claim_checkout(
        &self,
        order_id: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<Vec<CartEvent>, CartError> {
        if self.lines.is_empty() {
            return Err(CartError::Empty);
        }
        if let Some(pending) = self.pending_checkout.as_ref().filter(|p| p.is_live(now)) {
            return Err(CartError::CheckoutInProgress {
                order_id: pending.order_id,
            });
        }
        Ok(vec![CartEvent::checkout_claimed(order_id, self.lines.clone(), now)])
    }

    /// Drains the lines claimed for `order_id`.
    pub fn complete_checkout(&self, order_id: AggregateId) -> Result<Vec<CartEvent>, CartError> {
        if self.pending_order() != Some(order_id) {
            return Err(CartError::CheckoutNotClaimed { order_id });
        }
        Ok(vec![CartEvent::cart_checked_out(order_id)])
    }

    /// Gives the lines back after a failed checkout. A claim that was already
    /// taken over is left alone.
    pub fn release_checkout(&self, order_id: AggregateId) -> Result<Vec<CartEvent>, CartError> {
        if self.pending_order() != Some(order_id) {
            return Ok(vec![]);
        }
        Ok(vec![CartEvent::checkout_released(order_id)])
    }
}
