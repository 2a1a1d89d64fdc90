//! Payment records kept for the checkout flow.

use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId};
use serde::{Deserialize, Serialize};

use crate::error::OrderError;
use crate::order::Money;

/// Status of a payment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Checkout session opened, no outcome yet.
    #[default]
    Pending,
    Succeeded,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "succeeded" => Ok(PaymentStatus::Succeeded),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(OrderError::UnknownPaymentStatus(other.to_string())),
        }
    }
}

/// A payment attempt for an order, keyed by the provider's session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub amount: Money,
    pub currency: String,
    /// Provider name, e.g. `stripe`.
    pub method: String,
    pub status: PaymentStatus,
    /// Provider session or transaction id.
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Creates a pending payment for a checkout session.
    pub fn pending(
        order_id: OrderId,
        amount: Money,
        currency: impl Into<String>,
        method: impl Into<String>,
        transaction_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new(),
            order_id,
            amount,
            currency: currency.into(),
            method: method.into(),
            status: PaymentStatus::Pending,
            transaction_id: Some(transaction_id.into()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Updates the status and bumps `updated_at`.
    pub fn set_status(&mut self, status: PaymentStatus) {
        self.status = status;
        self.updated_at = Utc::now().max(self.updated_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_payment() {
        let order_id = OrderId::new();
        let payment =
            PaymentRecord::pending(order_id, Money::from_cents(4200), "USD", "stripe", "cs_1");

        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.order_id, order_id);
        assert_eq!(payment.transaction_id.as_deref(), Some("cs_1"));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("refunded".parse::<PaymentStatus>(), Ok(PaymentStatus::Refunded));
        assert!("remboursé".parse::<PaymentStatus>().is_err());
    }
}
