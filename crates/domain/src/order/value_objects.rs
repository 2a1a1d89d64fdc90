//! Value objects for the order domain.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::error::OrderError;

/// Money amount represented in cents to avoid floating point issues.
///
/// The currency is carried alongside the amount where it matters
/// (checkout, process start), not inside the value itself.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = 10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the whole-unit portion.
    pub fn units(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after whole units).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Multiplies by a quantity, saturating at the `i64` bounds.
    ///
    /// Amounts of a placed order never saturate; see [`Money::checked_multiply`].
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents.saturating_mul(i64::from(quantity)),
        }
    }

    /// Multiplies by a quantity, or `None` on overflow.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
    }

    /// Adds two amounts, or `None` on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.cents.checked_add(other.cents).map(Money::from_cents)
    }

    /// Applies a percentage discount, rounding half up to the cent.
    ///
    /// Percentages above 100 are clamped to 100.
    pub fn discounted(&self, percent: u8) -> Money {
        let keep = 100 - i128::from(percent.min(100));
        let cents = (i128::from(self.cents) * keep + 50).div_euclid(100);
        // |result| <= |self.cents| + 1 for keep in 0..=100.
        Money {
            cents: i64::try_from(cents).unwrap_or(self.cents),
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-{}.{:02}", self.units().abs(), self.cents_part())
        } else {
            write!(f, "{}.{:02}", self.units(), self.cents_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents.saturating_add(rhs.cents),
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents = self.cents.saturating_add(rhs.cents);
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

/// One product/quantity/price entry of an order, frozen at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// The product identifier.
    pub product_id: ProductId,

    /// Product name as shown when the order was placed.
    pub product_name: String,

    /// Effective unit price captured at validation time.
    pub unit_price: Money,

    /// Quantity ordered.
    pub quantity: u32,
}

impl OrderLine {
    /// Creates a new order line.
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            unit_price,
            quantity,
        }
    }

    /// Returns unit price times quantity.
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }

    /// Returns unit price times quantity, or `AmountOverflow`.
    pub fn checked_subtotal(&self) -> Result<Money, OrderError> {
        self.unit_price
            .checked_multiply(self.quantity)
            .ok_or(OrderError::AmountOverflow)
    }

    /// Sums the subtotals of `lines`, or `AmountOverflow`.
    pub fn checked_total(lines: &[OrderLine]) -> Result<Money, OrderError> {
        lines.iter().try_fold(Money::zero(), |total, line| {
            total
                .checked_add(line.checked_subtotal()?)
                .ok_or(OrderError::AmountOverflow)
        })
    }
}

/// Postal address captured with the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
}

impl ShippingAddress {
    /// Checks that every field carries a non-blank value.
    pub fn validate(&self) -> Result<(), OrderError> {
        let fields = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("address", &self.address),
            ("city", &self.city),
            ("state", &self.state),
            ("zip", &self.zip),
            ("country", &self.country),
        ];

        match fields.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(OrderError::BlankAddressField { field: *field }),
            None => Ok(()),
        }
    }
}
