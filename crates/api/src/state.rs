//! Shared application state.

use std::sync::Arc;

use fulfillment::{
    InMemoryPaymentGateway, InMemoryProcessEngine, OrderOrchestrator, PaymentError,
    PaymentGateway, PaymentService, ProcessEngine,
};
use store::{Catalog, InMemoryStore, InventoryLedger, OrderStore, PaymentStore};

/// Storage backends the HTTP surface can run on.
pub trait Backend:
    Catalog + InventoryLedger + OrderStore + PaymentStore + Clone + 'static
{
}

impl<T> Backend for T where
    T: Catalog + InventoryLedger + OrderStore + PaymentStore + Clone + 'static
{
}

/// Services shared by all handlers.
pub struct AppState<S: Backend> {
    pub orders: OrderOrchestrator<S>,
    pub payments: PaymentService<S>,
}

impl<S: Backend> AppState<S> {
    /// Builds the services over one store, sharing the currency.
    pub fn new(
        store: S,
        engine: Arc<dyn ProcessEngine>,
        gateway: Arc<dyn PaymentGateway>,
        currency: &str,
    ) -> Self {
        Self {
            orders: OrderOrchestrator::new(store.clone(), engine).with_currency(currency),
            payments: PaymentService::new(store, gateway).with_currency(currency),
        }
    }
}

/// Creates state over an in-memory store with the in-memory process engine
/// and payment gateway.
pub fn create_default_state(
    store: InMemoryStore,
    checkout_base_url: &str,
) -> Result<Arc<AppState<InMemoryStore>>, PaymentError> {
    let engine: Arc<dyn ProcessEngine> = Arc::new(InMemoryProcessEngine::new());
    let gateway: Arc<dyn PaymentGateway> = Arc::new(InMemoryPaymentGateway::new(checkout_base_url)?);
    Ok(Arc::new(AppState::new(
        store,
        engine,
        gateway,
        fulfillment::DEFAULT_CURRENCY,
    )))
}
