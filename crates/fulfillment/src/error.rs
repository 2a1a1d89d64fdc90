//! Fulfillment error types.

use common::{OrderId, PaymentId, ProductId};
use domain::OrderError;
use store::StoreError;
use thiserror::Error;

use crate::services::{EngineError, PaymentError};

/// Errors returned by the order orchestrator and the payment service.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// Product is unknown or not active.
    #[error("Product with ID {0} not found")]
    ProductNotFound(ProductId),

    /// Requested quantity exceeds current stock.
    #[error(
        "Insufficient stock for product {product_name}. Available: {available}, Requested: {requested}"
    )]
    InsufficientStock {
        product_name: String,
        available: u32,
        requested: u32,
    },

    /// No order with this id exists for the caller.
    #[error("Order with ID {0} not found")]
    OrderNotFound(OrderId),

    /// The order has no process, or the engine does not know it.
    #[error("Process not found for order {0}")]
    ProcessNotFound(OrderId),

    /// The request or mutation breaks an order rule.
    #[error("{0}")]
    InvalidOrder(#[from] OrderError),

    /// The process engine refused or failed a start on explicit retry.
    #[error("Failed to start fulfillment process for order {order_id}: {source}")]
    ProcessStartFailed {
        order_id: OrderId,
        #[source]
        source: EngineError,
    },

    /// The process engine failed while reading a status.
    #[error("Process engine error: {0}")]
    Engine(EngineError),

    /// The payment gateway failed.
    #[error("Payment gateway error: {0}")]
    Payment(#[from] PaymentError),

    /// No payment record with this id or session.
    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    /// Storage failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl FulfillmentError {
    pub(crate) fn payment_not_found(id: PaymentId) -> Self {
        FulfillmentError::PaymentNotFound(id.to_string())
    }
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
