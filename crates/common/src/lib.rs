//! Shared identifier types used across the storefront order core.

mod types;

pub use types::{OrderId, PaymentId, ProductId, UserId};
