//! Payment gateway trait and in-memory implementation.

use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::Money;
use reqwest::Url;
use thiserror::Error;

/// A checkout session opened with the payment provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Provider session id; the pending payment record is keyed by it.
    pub session_id: String,
    /// Where to send the customer to pay.
    pub redirect_url: String,
}

/// Errors raised by a payment gateway.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The gateway is misconfigured.
    #[error("Payment configuration error: {0}")]
    Config(String),

    /// The provider could not be reached or refused the session.
    #[error("Payment provider unavailable: {0}")]
    Unavailable(String),
}

/// Checks that a redirect URL is an absolute `http` or `https` URL.
pub fn validate_redirect_url(url: &str) -> Result<Url, PaymentError> {
    let parsed =
        Url::parse(url).map_err(|e| PaymentError::Config(format!("invalid URL '{url}': {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(PaymentError::Config(format!(
            "URL '{url}' must be an absolute http(s) URL"
        )));
    }
    Ok(parsed)
}

/// Payment provider capability: open a checkout session for an order.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Name stored as the payment method, e.g. `stripe`.
    fn provider(&self) -> &str;

    /// Opens a checkout session for `amount` in `currency`.
    async fn create_checkout_session(
        &self,
        order_id: OrderId,
        amount: Money,
        currency: &str,
        user_id: UserId,
    ) -> Result<CheckoutSession, PaymentError>;
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    sessions: Vec<(String, OrderId, Money)>,
    next_id: u32,
    fail_on_checkout: bool,
}

/// In-memory payment gateway for testing and local runs.
#[derive(Debug, Clone)]
pub struct InMemoryPaymentGateway {
    checkout_base_url: Url,
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a gateway whose redirect URLs live under `checkout_base_url`.
    pub fn new(checkout_base_url: &str) -> Result<Self, PaymentError> {
        Ok(Self {
            checkout_base_url: validate_redirect_url(checkout_base_url)?,
            state: Arc::default(),
        })
    }

    fn state(&self) -> RwLockWriteGuard<'_, InMemoryGatewayState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configures the gateway to fail on every checkout.
    pub fn set_fail_on_checkout(&self, fail: bool) {
        self.state().fail_on_checkout = fail;
    }

    /// Returns the number of sessions opened.
    pub fn session_count(&self) -> usize {
        self.state().sessions.len()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    fn provider(&self) -> &str {
        "stripe"
    }

    async fn create_checkout_session(
        &self,
        order_id: OrderId,
        amount: Money,
        currency: &str,
        _user_id: UserId,
    ) -> Result<CheckoutSession, PaymentError> {
        let mut state = self.state();
        if state.fail_on_checkout {
            return Err(PaymentError::Unavailable(
                "payment provider declined to open a session".to_string(),
            ));
        }

        state.next_id += 1;
        let session_id = format!("cs_test_{:04}", state.next_id);
        state.sessions.push((session_id.clone(), order_id, amount));

        let mut redirect = self.checkout_base_url.clone();
        redirect
            .path_segments_mut()
            .map_err(|_| PaymentError::Config("checkout base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["checkout", session_id.as_str()]);
        redirect
            .query_pairs_mut()
            .append_pair("amount", &amount.to_string())
            .append_pair("currency", currency);

        Ok(CheckoutSession {
            session_id,
            redirect_url: redirect.to_string(),
        })
    }
}
