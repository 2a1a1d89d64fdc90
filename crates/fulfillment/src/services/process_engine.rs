//! Fulfillment process engine trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::{Money, Order, OrderLine, ShippingAddress};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Everything the engine needs to drive an order's fulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderProcessContext {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub total: Money,
    pub lines: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    /// Payment parameters: the amount to capture and its currency.
    pub payment_amount: Money,
    pub currency: String,
}

impl OrderProcessContext {
    /// Builds the context for a persisted order.
    pub fn from_order(order: &Order, currency: impl Into<String>) -> Self {
        Self {
            order_id: order.id(),
            user_id: order.user_id(),
            total: order.total(),
            lines: order.lines().to_vec(),
            shipping_address: order.shipping_address().clone(),
            payment_amount: order.total(),
            currency: currency.into(),
        }
    }
}

/// Coarse state of a process instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Active,
    Suspended,
    Completed,
}

/// Status of a process instance as reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessStatus {
    pub process_handle: String,
    pub state: ProcessState,
    /// Raw payload from the engine.
    pub details: serde_json::Value,
}

/// Errors raised by a process engine adapter.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not be reached or refused the request.
    #[error("Process engine unavailable: {0}")]
    Unavailable(String),

    /// The engine has no instance with this handle.
    #[error("Process instance not found: {0}")]
    NotFound(String),

    /// The engine answered with something we cannot read.
    #[error("Unexpected process engine response: {0}")]
    InvalidResponse(String),

    /// HTTP transport error.
    #[error("Process engine request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// External workflow engine that drives fulfillment steps for an order.
#[async_trait]
pub trait ProcessEngine: Send + Sync {
    /// Starts a fulfillment process and returns its handle.
    async fn start_process(&self, context: &OrderProcessContext) -> Result<String, EngineError>;

    /// Reads the status of a process instance.
    async fn get_status(&self, process_handle: &str) -> Result<ProcessStatus, EngineError>;
}

#[derive(Debug)]
struct Instance {
    context: OrderProcessContext,
    state: ProcessState,
}

#[derive(Debug, Default)]
struct InMemoryEngineState {
    instances: HashMap<String, Instance>,
    next_id: u32,
    fail_on_start: bool,
    start_delay: Option<Duration>,
}

/// In-memory process engine for testing and local runs.
///
/// Handles are `PROC-0001`, `PROC-0002`, ... in start order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProcessEngine {
    state: Arc<RwLock<InMemoryEngineState>>,
}

impl InMemoryProcessEngine {
    /// Creates a new in-memory engine.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> RwLockWriteGuard<'_, InMemoryEngineState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configures the engine to refuse every start.
    pub fn set_fail_on_start(&self, fail: bool) {
        self.state().fail_on_start = fail;
    }

    /// Makes every start wait before answering.
    pub fn set_start_delay(&self, delay: Option<Duration>) {
        self.state().start_delay = delay;
    }

    /// Moves an instance to another state, as the engine would while
    /// working through the process.
    pub fn set_process_state(&self, process_handle: &str, state: ProcessState) -> bool {
        match self.state().instances.get_mut(process_handle) {
            Some(instance) => {
                instance.state = state;
                true
            }
            None => false,
        }
    }

    /// Drops an instance, as if the engine lost its record.
    pub fn forget(&self, process_handle: &str) -> bool {
        self.state().instances.remove(process_handle).is_some()
    }

    /// Returns the number of processes started.
    pub fn started_count(&self) -> usize {
        self.state().instances.len()
    }

    /// Returns the handles of every process started for an order.
    pub fn handles_for(&self, order_id: OrderId) -> Vec<String> {
        let mut handles: Vec<String> = self
            .state()
            .instances
            .iter()
            .filter(|(_, instance)| instance.context.order_id == order_id)
            .map(|(handle, _)| handle.clone())
            .collect();
        handles.sort();
        handles
    }
}

#[async_trait]
impl ProcessEngine for InMemoryProcessEngine {
    async fn start_process(&self, context: &OrderProcessContext) -> Result<String, EngineError> {
        let delay = self.state().start_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if state.fail_on_start {
            return Err(EngineError::Unavailable(
                "process engine is not accepting starts".to_string(),
            ));
        }

        state.next_id += 1;
        let handle = format!("PROC-{:04}", state.next_id);
        state.instances.insert(
            handle.clone(),
            Instance {
                context: context.clone(),
                state: ProcessState::Active,
            },
        );

        Ok(handle)
    }

    async fn get_status(&self, process_handle: &str) -> Result<ProcessStatus, EngineError> {
        let state = self.state();
        let instance = state
            .instances
            .get(process_handle)
            .ok_or_else(|| EngineError::NotFound(process_handle.to_string()))?;

        Ok(ProcessStatus {
            process_handle: process_handle.to_string(),
            state: instance.state,
            details: serde_json::json!({
                "id": process_handle,
                "businessKey": instance.context.order_id.to_string(),
                "suspended": instance.state == ProcessState::Suspended,
                "ended": instance.state == ProcessState::Completed,
                "variables": {
                    "userId": instance.context.user_id.to_string(),
                    "amount": instance.context.payment_amount.cents(),
                    "currency": instance.context.currency,
                    "items": instance.context.lines.len(),
                },
            }),
        })
    }
}
