//! Administrative order and payment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use domain::{OrderStatus, PaymentRecord};
use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::auth::Admin;
use crate::error::ApiError;
use crate::json::JsonBody;
use crate::routes::orders::{OrderResponse, to_responses};
use crate::routes::{parse_order_id, parse_payment_id, parse_product_id};
use crate::state::{AppState, Backend};

#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersParams {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct TrackingRequest {
    pub tracking_number: String,
}

#[derive(Debug, Deserialize)]
pub struct ReleaseStockRequest {
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct StockResponse {
    pub product_id: ProductId,
    pub stock: u32,
}

fn parse_status(raw: &str) -> Result<OrderStatus, ApiError> {
    raw.parse()
        .map_err(|e: domain::OrderError| ApiError::BadRequest(e.to_string()))
}

/// GET /admin/orders?status= — all orders, optionally filtered by status.
pub async fn list_orders<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = match params.status.as_deref() {
        Some(raw) => state.orders.get_orders_by_status(parse_status(raw)?).await?,
        None => state.orders.list_all_orders(None).await?,
    };
    Ok(Json(to_responses(&orders)))
}

/// GET /admin/orders/awaiting-process — orders with no process, oldest first.
pub async fn awaiting_process<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.orders_awaiting_process().await?;
    Ok(Json(to_responses(&orders)))
}

/// PATCH /admin/orders/{id}/status
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let status = parse_status(&req.status)?;
    let order = state.orders.update_status(order_id, status).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// PATCH /admin/orders/{id}/tracking — records tracking and ships the order.
#[tracing::instrument(skip(state, req))]
pub async fn add_tracking<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<TrackingRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .orders
        .add_tracking_number(order_id, &req.tracking_number)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /admin/orders/{id}/process — starts the process if none is linked.
#[tracing::instrument(skip(state))]
pub async fn retry_process<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.orders.retry_process_start(order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /admin/orders/{id}/payments
pub async fn list_payments<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Path(id): Path<String>,
) -> Result<Json<Vec<PaymentRecord>>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let payments = state.payments.payments_for_order(order_id).await?;
    Ok(Json(payments))
}

/// POST /admin/payments/{id}/refund
#[tracing::instrument(skip(state))]
pub async fn refund_payment<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Path(id): Path<String>,
) -> Result<Json<PaymentRecord>, ApiError> {
    let payment_id = parse_payment_id(&id)?;
    let payment = state.payments.refund(payment_id).await?;
    Ok(Json(payment))
}

/// POST /admin/products/{id}/stock/release — returns units to stock.
#[tracing::instrument(skip(state, req))]
pub async fn release_stock<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<ReleaseStockRequest>,
) -> Result<Json<StockResponse>, ApiError> {
    let product_id = parse_product_id(&id)?;
    let stock = state.orders.restock(product_id, req.quantity).await?;
    Ok(Json(StockResponse { product_id, stock }))
}
