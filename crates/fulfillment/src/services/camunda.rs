//! Process engine adapter for a Camunda 7 style REST API.
//!
//! Starts a process instance by definition key with the order id as the
//! business key, and reads instance status from the runtime endpoint,
//! falling back to history once the instance has ended.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::process_engine::{
    EngineError, OrderProcessContext, ProcessEngine, ProcessState, ProcessStatus,
};

/// Camunda adapter configuration.
#[derive(Debug, Clone)]
pub struct CamundaConfig {
    /// REST base URL, e.g. `http://localhost:8080/engine-rest`.
    pub base_url: String,

    /// Key of the process definition to start.
    pub process_definition_key: String,

    /// Request timeout.
    pub timeout: Duration,
}

impl Default for CamundaConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            process_definition_key: "order-fulfillment".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl CamundaConfig {
    /// Creates a config for the given base URL with default key and timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the process definition key.
    pub fn with_process_definition_key(mut self, key: impl Into<String>) -> Self {
        self.process_definition_key = key.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct InstanceCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RuntimeInstance {
    #[serde(default)]
    suspended: bool,
    #[serde(default)]
    ended: bool,
}

#[derive(Debug, Deserialize)]
struct HistoricInstance {
    state: Option<String>,
}

/// Process engine backed by a Camunda REST endpoint.
pub struct CamundaProcessEngine {
    client: Client,
    config: CamundaConfig,
}

impl CamundaProcessEngine {
    /// Creates a new adapter with the given configuration.
    pub fn new(config: CamundaConfig) -> Result<Self, EngineError> {
        if config.base_url.trim().is_empty() {
            return Err(EngineError::Unavailable(
                "process engine URL not configured".to_string(),
            ));
        }

        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Builds the start request body with typed process variables.
    fn start_body(context: &OrderProcessContext) -> Result<Value, EngineError> {
        let items = serde_json::to_string(&context.lines)
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;
        let address = serde_json::to_string(&context.shipping_address)
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;

        Ok(json!({
            "businessKey": context.order_id.to_string(),
            "variables": {
                "orderId": { "value": context.order_id.to_string(), "type": "String" },
                "userId": { "value": context.user_id.to_string(), "type": "String" },
                "totalCents": { "value": context.total.cents(), "type": "Long" },
                "items": { "value": items, "type": "Json" },
                "shippingAddress": { "value": address, "type": "Json" },
                "paymentAmountCents": { "value": context.payment_amount.cents(), "type": "Long" },
                "currency": { "value": context.currency, "type": "String" },
            },
        }))
    }

    async fn error_for(response: reqwest::Response) -> EngineError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        EngineError::Unavailable(format!(
            "HTTP {} - {}",
            status,
            body.chars().take(200).collect::<String>()
        ))
    }

    async fn historic_status(&self, process_handle: &str) -> Result<ProcessStatus, EngineError> {
        let response = self
            .client
            .get(self.url(&format!("history/process-instance/{process_handle}")))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(EngineError::NotFound(process_handle.to_string()));
        }
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let details: Value = response.json().await?;
        let historic: HistoricInstance = serde_json::from_value(details.clone())
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;

        let state = match historic.state.as_deref() {
            Some("ACTIVE") => ProcessState::Active,
            Some("SUSPENDED") => ProcessState::Suspended,
            _ => ProcessState::Completed,
        };

        Ok(ProcessStatus {
            process_handle: process_handle.to_string(),
            state,
            details,
        })
    }
}

#[async_trait]
impl ProcessEngine for CamundaProcessEngine {
    #[tracing::instrument(skip(self, context), fields(order_id = %context.order_id))]
    async fn start_process(&self, context: &OrderProcessContext) -> Result<String, EngineError> {
        let url = self.url(&format!(
            "process-definition/key/{}/start",
            self.config.process_definition_key
        ));
        let body = Self::start_body(context)?;

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let error = Self::error_for(response).await;
            warn!(%url, error = %error, "process start rejected");
            return Err(error);
        }

        let created: InstanceCreated = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;

        debug!(process_handle = %created.id, "process instance started");
        Ok(created.id)
    }

    async fn get_status(&self, process_handle: &str) -> Result<ProcessStatus, EngineError> {
        let response = self
            .client
            .get(self.url(&format!("process-instance/{process_handle}")))
            .send()
            .await?;

        // The runtime API forgets instances once they end.
        if response.status() == StatusCode::NOT_FOUND {
            return self.historic_status(process_handle).await;
        }
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let details: Value = response.json().await?;
        let runtime: RuntimeInstance = serde_json::from_value(details.clone())
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;

        let state = if runtime.ended {
            ProcessState::Completed
        } else if runtime.suspended {
            ProcessState::Suspended
        } else {
            ProcessState::Active
        };

        Ok(ProcessStatus {
            process_handle: process_handle.to_string(),
            state,
            details,
        })
    }
}
