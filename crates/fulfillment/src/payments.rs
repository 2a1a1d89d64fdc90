//! Checkout flow: opens provider sessions for orders and tracks the
//! resulting payment records.

use std::sync::Arc;

use common::{OrderId, PaymentId, UserId};
use domain::{PaymentRecord, PaymentStatus};
use serde::Deserialize;
use store::{OrderStore, OrderStoreExt, PaymentStore, StoreError};

use crate::error::{FulfillmentError, Result};
use crate::orchestrator::DEFAULT_CURRENCY;
use crate::services::{PaymentGateway, validate_redirect_url};

/// Final outcome reported by the payment provider for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
}

impl From<PaymentOutcome> for PaymentStatus {
    fn from(outcome: PaymentOutcome) -> Self {
        match outcome {
            PaymentOutcome::Succeeded => PaymentStatus::Succeeded,
            PaymentOutcome::Failed => PaymentStatus::Failed,
        }
    }
}

/// A pending payment and where to send the customer to complete it.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub payment: PaymentRecord,
    pub redirect_url: String,
}

/// Payment records for orders, backed by a [`PaymentGateway`].
pub struct PaymentService<S>
where
    S: OrderStore + PaymentStore,
{
    store: S,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
}

impl<S> PaymentService<S>
where
    S: OrderStore + PaymentStore,
{
    /// Creates a new payment service.
    pub fn new(store: S, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            store,
            gateway,
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }

    /// Sets the currency sessions are opened in.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Opens a checkout session for the caller's order and records a
    /// pending payment keyed by the session id.
    #[tracing::instrument(skip(self))]
    pub async fn create_checkout(&self, user_id: UserId, order_id: OrderId) -> Result<Checkout> {
        let order = self
            .store
            .get_order_for_user(order_id, user_id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound(order_id))?;

        let session = self
            .gateway
            .create_checkout_session(order.id(), order.total(), &self.currency, user_id)
            .await?;
        validate_redirect_url(&session.redirect_url)?;

        let payment = PaymentRecord::pending(
            order.id(),
            order.total(),
            self.currency.clone(),
            self.gateway.provider(),
            session.session_id,
        );
        self.store.insert_payment(&payment).await?;

        metrics::counter!("checkout_sessions_total").increment(1);
        tracing::info!(%order_id, payment_id = %payment.id, "checkout session opened");

        Ok(Checkout {
            payment,
            redirect_url: session.redirect_url,
        })
    }

    /// Records the provider's outcome for a checkout session.
    #[tracing::instrument(skip(self))]
    pub async fn record_outcome(
        &self,
        session_id: &str,
        outcome: PaymentOutcome,
    ) -> Result<PaymentRecord> {
        let payment = self
            .store
            .find_payment_by_transaction(session_id)
            .await?
            .ok_or_else(|| FulfillmentError::PaymentNotFound(session_id.to_string()))?;

        let updated = self.set_status(payment.id, outcome.into()).await?;
        tracing::info!(
            order_id = %updated.order_id,
            status = %updated.status,
            "payment outcome recorded"
        );
        Ok(updated)
    }

    /// Marks a payment refunded.
    #[tracing::instrument(skip(self))]
    pub async fn refund(&self, payment_id: PaymentId) -> Result<PaymentRecord> {
        self.set_status(payment_id, PaymentStatus::Refunded).await
    }

    /// Lists the payments of an order, newest first.
    pub async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<PaymentRecord>> {
        if self.store.get_order(order_id).await?.is_none() {
            return Err(FulfillmentError::OrderNotFound(order_id));
        }
        Ok(self.store.payments_for_order(order_id).await?)
    }

    async fn set_status(&self, payment_id: PaymentId, status: PaymentStatus) -> Result<PaymentRecord> {
        self.store
            .update_payment_status(payment_id, status)
            .await
            .map_err(|e| match e {
                StoreError::PaymentNotFound(id) => FulfillmentError::payment_not_found(id),
                other => FulfillmentError::Store(other),
            })
    }
}
