use common::{OrderId, PaymentId, ProductId};
use domain::OrderError;
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional stock decrement found less stock than requested.
    /// The whole unit of work has been rolled back.
    #[error(
        "Insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
        requested: u32,
    },

    /// The product is missing or no longer active.
    #[error("Product unavailable: {0}")]
    ProductUnavailable(ProductId),

    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The payment record does not exist.
    #[error("Payment not found: {0}")]
    PaymentNotFound(PaymentId),

    /// An order with this id was already stored.
    #[error("Order already exists: {0}")]
    DuplicateOrder(OrderId),

    /// A stored row failed domain validation when loaded.
    #[error("Corrupt stored data: {0}")]
    Corrupt(#[from] OrderError),

    /// A stored value that cannot be represented in the domain.
    #[error("Invalid stored value in {column}: {value}")]
    InvalidValue { column: &'static str, value: i64 },

    /// The in-memory store was told to fail writes.
    #[error("Store unavailable")]
    Unavailable,

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
