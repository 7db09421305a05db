//! Value objects shared by every aggregate.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Identifier of a user as issued by the identity service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of a sellable product variant owned by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(i64);

impl VariantId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for VariantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for VariantId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Money amount represented in cents to avoid floating point issues.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = 10.00)
    cents: i64,
}

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Whole currency units, e.g. `from_major(1900)` is 1900.00.
    pub fn from_major(units: i64) -> Self {
        Self { cents: units * 100 }
    }

    /// Converts a decimal amount, rounding half away from zero to cents.
    ///
    /// Returns `None` when the amount does not fit.
    pub fn from_decimal(amount: Decimal) -> Option<Self> {
        let cents = (amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()?;
        Some(Self { cents })
    }

    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.cents, 2)
    }

    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }

    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents * quantity as i64,
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents + rhs.cents,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents += rhs.cents;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// Postal address. Orders and shipments keep their own copy, so later edits
/// to the address book never reach them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    pub country: String,
}

impl Address {
    /// Country used when a source leaves it out.
    pub const DEFAULT_COUNTRY: &'static str = "CL";

    /// A courier needs at least a street line, a city and a country.
    pub fn is_deliverable(&self) -> bool {
        !self.line1.trim().is_empty()
            && !self.city.trim().is_empty()
            && !self.country.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn money_arithmetic() {
        let price = Money::from_major(1000);
        assert_eq!(price.multiply(2), Money::from_major(2000));
        assert_eq!(price + Money::from_cents(50), Money::from_cents(100_050));

        let total: Money = [Money::from_major(1), Money::from_major(2)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_major(3));
    }

    #[test]
    fn money_display() {
        assert_eq!(Money::from_major(2000).to_string(), "2000.00");
        assert_eq!(Money::from_cents(1999).to_string(), "19.99");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
    }

    #[test]
    fn money_decimal_conversion() {
        let parsed = Money::from_decimal(Decimal::from_str("19.995").unwrap()).unwrap();
        assert_eq!(parsed.cents(), 2000);
        assert_eq!(
            Money::from_decimal(Decimal::from(1900)).unwrap(),
            Money::from_major(1900)
        );
        assert_eq!(
            Money::from_cents(570_000).to_decimal(),
            Decimal::from_str("5700.00").unwrap()
        );
    }

    #[test]
    fn address_deliverability() {
        let mut address = Address {
            line1: "Av. Siempre Viva 742".to_string(),
            line2: None,
            city: "Santiago".to_string(),
            state: None,
            zip: None,
            country: Address::DEFAULT_COUNTRY.to_string(),
        };
        assert!(address.is_deliverable());

        address.city = "   ".to_string();
        assert!(!address.is_deliverable());
    }
}
