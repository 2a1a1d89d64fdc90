//! Domain error types.

use thiserror::Error;

/// Errors raised when an order or order request breaks a domain rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// An order must contain at least one line.
    #[error("Order has no items")]
    NoItems,

    /// Every requested quantity must be positive.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// A shipping address field is empty or whitespace.
    #[error("Shipping address field '{field}' must not be blank")]
    BlankAddressField { field: &'static str },

    /// Tracking numbers must carry a value.
    #[error("Tracking number must not be blank")]
    BlankTrackingNumber,

    /// A line subtotal or the order total does not fit in the money range.
    #[error("Order amount exceeds the supported range")]
    AmountOverflow,

    /// A stored order whose total disagrees with its lines.
    #[error("Order total {stored} does not match line subtotals {computed}")]
    TotalMismatch { stored: i64, computed: i64 },

    /// Unknown status name.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    /// Unknown payment status name.
    #[error("Unknown payment status: {0}")]
    UnknownPaymentStatus(String),
}
