//! HTTP route handlers.

pub mod admin;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod payments;

use common::{OrderId, PaymentId, ProductId};

use crate::error::ApiError;

pub(crate) fn parse_order_id(raw: &str) -> Result<OrderId, ApiError> {
    OrderId::parse(raw).map_err(|_| ApiError::BadRequest(format!("Invalid order ID: {raw}")))
}

pub(crate) fn parse_payment_id(raw: &str) -> Result<PaymentId, ApiError> {
    PaymentId::parse(raw).map_err(|_| ApiError::BadRequest(format!("Invalid payment ID: {raw}")))
}

pub(crate) fn parse_product_id(raw: &str) -> Result<ProductId, ApiError> {
    ProductId::parse(raw).map_err(|_| ApiError::BadRequest(format!("Invalid product ID: {raw}")))
}
