//! Order endpoints for customers, plus the process engine callback.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId};
use domain::{Order, OrderLine, OrderRequest, OrderStatus, ShippingAddress};
use fulfillment::{ProcessStatus, ProcessUpdate};
use serde::Serialize;

use crate::auth::{Admin, Caller};
use crate::error::ApiError;
use crate::json::JsonBody;
use crate::routes::parse_order_id;
use crate::state::{AppState, Backend};

#[derive(Debug, Serialize)]
pub struct OrderLineResponse {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price_cents: i64,
    pub quantity: u32,
    pub subtotal_cents: i64,
}

impl From<&OrderLine> for OrderLineResponse {
    fn from(line: &OrderLine) -> Self {
        Self {
            product_id: line.product_id,
            product_name: line.product_name.clone(),
            unit_price_cents: line.unit_price.cents(),
            quantity: line.quantity,
            subtotal_cents: line.subtotal().cents(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub items: Vec<OrderLineResponse>,
    pub total_cents: i64,
    pub total_quantity: u64,
    pub shipping_address: ShippingAddress,
    pub tracking_number: Option<String>,
    pub process_handle: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id(),
            user_id: order.user_id(),
            status: order.status(),
            items: order.lines().iter().map(OrderLineResponse::from).collect(),
            total_cents: order.total().cents(),
            total_quantity: order.total_quantity(),
            shipping_address: order.shipping_address().clone(),
            tracking_number: order.tracking_number().map(str::to_string),
            process_handle: order.process_handle().map(str::to_string),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

pub(crate) fn to_responses(orders: &[Order]) -> Vec<OrderResponse> {
    orders.iter().map(OrderResponse::from).collect()
}

/// POST /orders — places an order for the caller.
#[tracing::instrument(skip(state, req), fields(user_id = %caller.user_id))]
pub async fn create<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    JsonBody(req): JsonBody<OrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state.orders.create(caller.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /orders — lists the caller's orders, newest first.
pub async fn list<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.list_own_orders(caller.user_id).await?;
    Ok(Json(to_responses(&orders)))
}

/// GET /orders/{id} — returns one of the caller's orders.
pub async fn get<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.orders.find_one(caller.user_id, order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /orders/{id}/process-status — owner or admin.
#[tracing::instrument(skip(state))]
pub async fn process_status<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ProcessStatus>, ApiError> {
    let order_id = parse_order_id(&id)?;
    if !caller.is_admin() {
        // Foreign orders look missing.
        state.orders.find_one(caller.user_id, order_id).await?;
    }
    let status = state.orders.get_process_status(order_id).await?;
    Ok(Json(status))
}

/// POST /orders/{id}/process-callback — update pushed by the process engine.
#[tracing::instrument(skip(state, update))]
pub async fn process_callback<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    _engine: Admin,
    Path(id): Path<String>,
    JsonBody(update): JsonBody<ProcessUpdate>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.orders.apply_process_update(order_id, update).await?;
    Ok(Json(OrderResponse::from(&order)))
}
