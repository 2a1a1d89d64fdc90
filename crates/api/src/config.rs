//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use fulfillment::CamundaConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `text` or `json` (default: `text`)
/// - `DATABASE_URL` — PostgreSQL URL; in-memory store when unset
/// - `DATABASE_MAX_CONNECTIONS` — pool size (default: `5`)
/// - `PROCESS_ENGINE_URL` — Camunda REST base URL; in-memory engine when unset
/// - `PROCESS_DEFINITION_KEY` — process to start (default: `"order-fulfillment"`)
/// - `PROCESS_ENGINE_TIMEOUT_SECS` — engine request timeout (default: `10`)
/// - `ORDER_CURRENCY` — currency for payments (default: `"USD"`)
/// - `CHECKOUT_BASE_URL` — base of checkout redirect URLs
/// - `CATALOG_SEED_PATH` — JSON product list loaded at start-up
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub process_engine_url: Option<String>,
    pub process_definition_key: String,
    pub process_engine_timeout: Duration,
    pub order_currency: String,
    pub checkout_base_url: String,
    pub catalog_seed_path: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from any key lookup, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        // Empty values count as unset.
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match var("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: var("DATABASE_URL"),
            database_max_connections: var("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.database_max_connections),
            process_engine_url: var("PROCESS_ENGINE_URL"),
            process_definition_key: var("PROCESS_DEFINITION_KEY")
                .unwrap_or(defaults.process_definition_key),
            process_engine_timeout: var("PROCESS_ENGINE_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.process_engine_timeout),
            order_currency: var("ORDER_CURRENCY").unwrap_or(defaults.order_currency),
            checkout_base_url: var("CHECKOUT_BASE_URL").unwrap_or(defaults.checkout_base_url),
            catalog_seed_path: var("CATALOG_SEED_PATH").map(PathBuf::from),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the Camunda adapter configuration when an engine URL is set.
    pub fn camunda(&self) -> Option<CamundaConfig> {
        self.process_engine_url.as_ref().map(|url| {
            CamundaConfig::new(url.clone())
                .with_process_definition_key(self.process_definition_key.clone())
                .with_timeout(self.process_engine_timeout)
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 5,
            process_engine_url: None,
            process_definition_key: "order-fulfillment".to_string(),
            process_engine_timeout: Duration::from_secs(10),
            order_currency: fulfillment::DEFAULT_CURRENCY.to_string(),
            checkout_base_url: "http://localhost:3000/payments".to_string(),
            catalog_seed_path: None,
        }
    }
}
