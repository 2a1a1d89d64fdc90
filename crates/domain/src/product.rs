//! Products as consumed from the catalog.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::order::Money;

/// A catalog product as seen by the order core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// List price before discount.
    pub price: Money,
    /// Discount percentage, 0 when none.
    #[serde(default)]
    pub discount_percent: u8,
    pub stock: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Product {
    /// Creates an active product without discount.
    pub fn new(id: ProductId, name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            discount_percent: 0,
            stock,
            active: true,
        }
    }

    /// Sets the discount percentage.
    pub fn with_discount(mut self, percent: u8) -> Self {
        self.discount_percent = percent;
        self
    }

    /// Marks the product inactive.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Price after applying the current discount.
    pub fn effective_price(&self) -> Money {
        if self.discount_percent == 0 {
            self.price
        } else {
            self.price.discounted(self.discount_percent)
        }
    }
}
