//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use api::{AppState, Backend};
use fulfillment::{
    CamundaProcessEngine, InMemoryPaymentGateway, InMemoryProcessEngine, PaymentGateway,
    ProcessEngine,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryStore, PostgresStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn process_engine(config: &Config) -> Arc<dyn ProcessEngine> {
    match config.camunda() {
        Some(camunda) => {
            tracing::info!(base_url = %camunda.base_url, "using Camunda process engine");
            Arc::new(CamundaProcessEngine::new(camunda).expect("invalid process engine config"))
        }
        None => {
            tracing::warn!("PROCESS_ENGINE_URL not set, using in-memory process engine");
            Arc::new(InMemoryProcessEngine::new())
        }
    }
}

async fn serve<S: Backend>(
    config: &Config,
    store: S,
    engine: Arc<dyn ProcessEngine>,
    gateway: Arc<dyn PaymentGateway>,
    metrics_handle: PrometheusHandle,
) {
    let state = Arc::new(AppState::new(
        store,
        engine,
        gateway,
        &config.order_currency,
    ));
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Outbound services
    let engine = process_engine(&config);
    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        InMemoryPaymentGateway::new(&config.checkout_base_url)
            .expect("invalid CHECKOUT_BASE_URL"),
    );

    let products = match &config.catalog_seed_path {
        Some(path) => api::seed::load_products(path).expect("failed to load catalog seed"),
        None => Vec::new(),
    };

    // 4. Storage, then serve
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await
                .expect("failed to connect to database");
            let store = PostgresStore::new(pool);
            store.run_migrations().await.expect("migrations failed");
            store
                .seed_products(products)
                .await
                .expect("failed to seed catalog");
            tracing::info!("using PostgreSQL store");
            serve(&config, store, engine, gateway, metrics_handle).await;
        }
        None => {
            let store = InMemoryStore::new();
            store.seed_products(products).await;
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            serve(&config, store, engine, gateway, metrics_handle).await;
        }
    }

    tracing::info!("server shut down gracefully");
}
