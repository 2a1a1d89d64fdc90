//! Domain model for the storefront order core.
//!
//! This crate provides:
//! - The order aggregate with its lines, status and shipping address snapshot
//! - Creation requests and their validation
//! - Products as consumed from the catalog, with effective pricing
//! - Payment records for the checkout flow

pub mod error;
pub mod order;
pub mod payment;
pub mod product;

pub use error::OrderError;
pub use order::{
    Money, Order, OrderLine, OrderParts, OrderRequest, OrderStatus, RequestedItem,
    ShippingAddress,
};
pub use payment::{PaymentRecord, PaymentStatus};
pub use product::Product;
