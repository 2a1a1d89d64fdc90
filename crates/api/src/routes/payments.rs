//! Checkout endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, PaymentId};
use domain::{PaymentRecord, PaymentStatus};
use fulfillment::PaymentOutcome;
use serde::{Deserialize, Serialize};

use crate::auth::{Admin, Caller};
use crate::error::ApiError;
use crate::json::JsonBody;
use crate::state::{AppState, Backend};

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub order_id: OrderId,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub session_id: Option<String>,
    pub status: PaymentStatus,
    pub amount_cents: i64,
    pub currency: String,
    pub redirect_url: String,
}

#[derive(Debug, Deserialize)]
pub struct OutcomeRequest {
    pub outcome: PaymentOutcome,
}

/// POST /payments/checkout — opens a checkout session for one of the
/// caller's orders.
#[tracing::instrument(skip(state, req), fields(user_id = %caller.user_id))]
pub async fn checkout<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    JsonBody(req): JsonBody<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let checkout = state
        .payments
        .create_checkout(caller.user_id, req.order_id)
        .await?;

    let payment = checkout.payment;
    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            payment_id: payment.id,
            order_id: payment.order_id,
            session_id: payment.transaction_id,
            status: payment.status,
            amount_cents: payment.amount.cents(),
            currency: payment.currency,
            redirect_url: checkout.redirect_url,
        }),
    ))
}

/// POST /payments/sessions/{id}/outcome — provider result for a session.
#[tracing::instrument(skip(state, req))]
pub async fn record_outcome<S: Backend>(
    State(state): State<Arc<AppState<S>>>,
    _admin: Admin,
    Path(session_id): Path<String>,
    JsonBody(req): JsonBody<OutcomeRequest>,
) -> Result<Json<PaymentRecord>, ApiError> {
    let payment = state
        .payments
        .record_outcome(&session_id, req.outcome)
        .await?;
    Ok(Json(payment))
}
