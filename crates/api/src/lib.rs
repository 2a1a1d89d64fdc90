//! HTTP API for the storefront order core.
//!
//! Exposes order creation, owner and administrative queries, process
//! linkage and checkout over REST, with structured logging (tracing) and
//! Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod json;
pub mod routes;
pub mod seed;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, Backend, create_default_state};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Backend>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    use routes::{admin, orders, payments};

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(orders::create::<S>).get(orders::list::<S>))
        .route("/orders/{id}", get(orders::get::<S>))
        .route("/orders/{id}/process-status", get(orders::process_status::<S>))
        .route(
            "/orders/{id}/process-callback",
            post(orders::process_callback::<S>),
        )
        .route("/admin/orders", get(admin::list_orders::<S>))
        .route(
            "/admin/orders/awaiting-process",
            get(admin::awaiting_process::<S>),
        )
        .route("/admin/orders/{id}/status", patch(admin::update_status::<S>))
        .route("/admin/orders/{id}/tracking", patch(admin::add_tracking::<S>))
        .route("/admin/orders/{id}/process", post(admin::retry_process::<S>))
        .route("/admin/orders/{id}/payments", get(admin::list_payments::<S>))
        .route(
            "/admin/payments/{id}/refund",
            post(admin::refund_payment::<S>),
        )
        .route(
            "/admin/products/{id}/stock/release",
            post(admin::release_stock::<S>),
        )
        .route("/payments/checkout", post(payments::checkout::<S>))
        .route(
            "/payments/sessions/{id}/outcome",
            post(payments::record_outcome::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
