//! Order orchestrator: creation against live inventory, process linkage,
//! and the owner and administrative queries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use common::{OrderId, ProductId, UserId};
use domain::{Order, OrderError, OrderLine, OrderRequest, OrderStatus, Product};
use serde::Deserialize;
use store::{Catalog, InventoryLedger, OrderQuery, OrderStore, OrderStoreExt, StoreError};
use tokio::sync::Mutex;

use crate::error::{FulfillmentError, Result};
use crate::services::{EngineError, OrderProcessContext, ProcessEngine, ProcessStatus};

/// Default currency for payment parameters sent with a process start.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Update pushed by the process engine for an order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProcessUpdate {
    pub status: OrderStatus,
    /// When present the order is shipped with this tracking number and
    /// `status` is ignored.
    #[serde(default)]
    pub tracking_number: Option<String>,
}

/// Creates orders atomically against inventory and links them to the
/// external fulfillment process.
///
/// Process start happens after the order is committed. A failed start
/// during creation is logged and counted but never fails the creation;
/// such orders can be listed with [`OrderOrchestrator::orders_awaiting_process`]
/// and restarted with [`OrderOrchestrator::retry_process_start`].
pub struct OrderOrchestrator<S>
where
    S: Catalog + OrderStore,
{
    store: S,
    engine: Arc<dyn ProcessEngine>,
    currency: String,
    retry_locks: Mutex<HashMap<OrderId, Arc<Mutex<()>>>>,
}

impl<S> OrderOrchestrator<S>
where
    S: Catalog + OrderStore,
{
    /// Creates a new orchestrator.
    pub fn new(store: S, engine: Arc<dyn ProcessEngine>) -> Self {
        Self {
            store,
            engine,
            currency: DEFAULT_CURRENCY.to_string(),
            retry_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the currency sent with process starts.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Creates an order for `user_id`.
    ///
    /// Validates the request, prices every line at the product's effective
    /// price, persists the order while reserving stock in one unit of work,
    /// then tries to start the fulfillment process. Returns the order as
    /// stored.
    #[tracing::instrument(skip(self, request), fields(items = request.items.len()))]
    pub async fn create(&self, user_id: UserId, request: OrderRequest) -> Result<Order> {
        let started = Instant::now();
        let result = self.place(user_id, request).await;
        metrics::histogram!("order_creation_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(
                    order_id = %order.id(),
                    total = %order.total(),
                    process_started = order.process_handle().is_some(),
                    "order created"
                );
            }
            Err(e) => {
                metrics::counter!("order_creation_rejected_total", "reason" => rejection_reason(e))
                    .increment(1);
                tracing::info!(error = %e, "order creation rejected");
            }
        }
        result
    }

    async fn place(&self, user_id: UserId, request: OrderRequest) -> Result<Order> {
        request.validate()?;

        // 1. Validate every product and its stock before any write
        let mut products: HashMap<ProductId, Product> = HashMap::new();
        for (product_id, requested) in request.requested_quantities() {
            let product = self
                .store
                .get_active_product(product_id)
                .await?
                .ok_or(FulfillmentError::ProductNotFound(product_id))?;

            if requested > product.stock {
                return Err(FulfillmentError::InsufficientStock {
                    product_name: product.name,
                    available: product.stock,
                    requested,
                });
            }
            products.insert(product_id, product);
        }

        // 2. Price the lines in request order
        let mut lines = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let product = products
                .get(&item.product_id)
                .ok_or(FulfillmentError::ProductNotFound(item.product_id))?;
            lines.push(OrderLine::new(
                product.id,
                product.name.clone(),
                product.effective_price(),
                item.quantity,
            ));
        }

        let mut order = Order::place(user_id, lines, request.shipping_address)?;
        let order_id = order.id();

        // 3. Persist and reserve atomically, then start fulfillment. The
        // order's process lock is held across both so a retry issued once
        // the order is visible waits for this start.
        let lock = self.process_lock(order_id).await;
        let started = {
            let _guard = lock.lock().await;
            match self.store.place_order(&order).await {
                Ok(()) => Ok(self.start_after_commit(&order).await),
                Err(e) => Err(Self::placement_error(e, &products)),
            }
        };
        self.release_process_lock(order_id, lock).await;
        let handle = started?;

        let error = match self.store.get_order(order_id).await {
            Ok(Some(stored)) => return Ok(stored),
            Ok(None) => "order missing after commit".to_string(),
            Err(e) => e.to_string(),
        };

        // The order and its reservation are committed; answer with the copy in hand.
        tracing::error!(%order_id, %error, "failed to reload created order");
        if let Some(handle) = handle {
            order.attach_process_handle(handle);
        }
        Ok(order)
    }

    fn placement_error(error: StoreError, products: &HashMap<ProductId, Product>) -> FulfillmentError {
        match error {
            StoreError::InsufficientStock {
                product_id,
                available,
                requested,
            } => FulfillmentError::InsufficientStock {
                product_name: products
                    .get(&product_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| product_id.to_string()),
                available,
                requested,
            },
            StoreError::ProductUnavailable(product_id) => {
                FulfillmentError::ProductNotFound(product_id)
            }
            other => FulfillmentError::Store(other),
        }
    }

    /// Starts the process for a freshly committed order and returns the
    /// handle if it was linked.
    async fn start_after_commit(&self, order: &Order) -> Option<String> {
        let order_id = order.id();
        let context = OrderProcessContext::from_order(order, &self.currency);

        match self.engine.start_process(&context).await {
            Ok(handle) => match self.store.attach_process_handle(order_id, &handle).await {
                Ok(true) => {
                    tracing::debug!(%order_id, process_handle = %handle, "process started");
                    Some(handle)
                }
                Ok(false) => {
                    tracing::warn!(%order_id, process_handle = %handle, "order already linked to another process");
                    None
                }
                Err(e) => {
                    metrics::counter!("order_process_start_failures_total").increment(1);
                    tracing::error!(%order_id, process_handle = %handle, error = %e, "failed to link process to order");
                    None
                }
            },
            Err(e) => {
                metrics::counter!("order_process_start_failures_total").increment(1);
                tracing::warn!(%order_id, error = %e, "failed to start fulfillment process");
                None
            }
        }
    }

    async fn process_lock(&self, order_id: OrderId) -> Arc<Mutex<()>> {
        let mut locks = self.retry_locks.lock().await;
        locks.entry(order_id).or_default().clone()
    }

    async fn release_process_lock(&self, order_id: OrderId, lock: Arc<Mutex<()>>) {
        let mut locks = self.retry_locks.lock().await;
        // Only the map and this caller still hold the lock.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&order_id);
        }
    }

    /// Lists the caller's own orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_own_orders(&self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self.store.list_for_user(user_id).await?)
    }

    /// Lists orders across all owners, newest first, optionally by status.
    #[tracing::instrument(skip(self))]
    pub async fn list_all_orders(&self, status: Option<OrderStatus>) -> Result<Vec<Order>> {
        Ok(self
            .store
            .query_orders(OrderQuery::new().maybe_status(status))
            .await?)
    }

    /// Lists orders in one status across all owners, newest first.
    pub async fn get_orders_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        self.list_all_orders(Some(status)).await
    }

    /// Loads an order owned by `user_id`.
    ///
    /// A foreign order is reported exactly like a missing one.
    #[tracing::instrument(skip(self))]
    pub async fn find_one(&self, user_id: UserId, order_id: OrderId) -> Result<Order> {
        self.store
            .get_order_for_user(order_id, user_id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound(order_id))
    }

    /// Loads any order regardless of owner.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound(order_id))
    }

    /// Sets the status of an order. Any status may follow any other.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, order_id: OrderId, status: OrderStatus) -> Result<Order> {
        let mut order = self.get_order(order_id).await?;
        let previous = order.status();
        order.set_status(status);
        self.store.save_order(&order).await?;

        tracing::info!(%order_id, from = %previous, to = %status, "order status updated");
        Ok(order)
    }

    /// Records a tracking number and ships the order.
    #[tracing::instrument(skip(self))]
    pub async fn add_tracking_number(
        &self,
        order_id: OrderId,
        tracking_number: &str,
    ) -> Result<Order> {
        let mut order = self.get_order(order_id).await?;
        order.assign_tracking_number(tracking_number)?;
        self.store.save_order(&order).await?;

        tracing::info!(%order_id, tracking_number, "order shipped");
        Ok(order)
    }

    /// Applies a status update pushed by the process engine.
    #[tracing::instrument(skip(self))]
    pub async fn apply_process_update(
        &self,
        order_id: OrderId,
        update: ProcessUpdate,
    ) -> Result<Order> {
        match update.tracking_number {
            Some(tracking_number) => self.add_tracking_number(order_id, &tracking_number).await,
            None => self.update_status(order_id, update.status).await,
        }
    }

    /// Returns the engine's view of the order's fulfillment process.
    #[tracing::instrument(skip(self))]
    pub async fn get_process_status(&self, order_id: OrderId) -> Result<ProcessStatus> {
        let order = self.get_order(order_id).await?;
        let handle = order
            .process_handle()
            .ok_or(FulfillmentError::ProcessNotFound(order_id))?;

        match self.engine.get_status(handle).await {
            Ok(status) => Ok(status),
            Err(EngineError::NotFound(_)) => Err(FulfillmentError::ProcessNotFound(order_id)),
            Err(e) => Err(FulfillmentError::Engine(e)),
        }
    }

    /// Lists orders whose fulfillment process never started, oldest first.
    pub async fn orders_awaiting_process(&self) -> Result<Vec<Order>> {
        Ok(self.store.query_orders(OrderQuery::awaiting_process()).await?)
    }

    /// Starts the fulfillment process for an order that has none.
    ///
    /// An order that already has a handle is returned unchanged. Retries
    /// and the start issued by [`OrderOrchestrator::create`] are serialized
    /// per order within this orchestrator, so at most one start is issued.
    #[tracing::instrument(skip(self))]
    pub async fn retry_process_start(&self, order_id: OrderId) -> Result<Order> {
        let lock = self.process_lock(order_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.start_if_missing(order_id).await
        };
        self.release_process_lock(order_id, lock).await;
        result
    }

    async fn start_if_missing(&self, order_id: OrderId) -> Result<Order> {
        let order = self.get_order(order_id).await?;
        if order.process_handle().is_some() {
            tracing::debug!(%order_id, "process already started");
            return Ok(order);
        }

        let context = OrderProcessContext::from_order(&order, &self.currency);
        let handle = self
            .engine
            .start_process(&context)
            .await
            .map_err(|source| {
                metrics::counter!("order_process_start_failures_total").increment(1);
                tracing::warn!(%order_id, error = %source, "process start retry failed");
                FulfillmentError::ProcessStartFailed { order_id, source }
            })?;

        if !self.store.attach_process_handle(order_id, &handle).await? {
            tracing::warn!(%order_id, process_handle = %handle, "order already linked to another process");
        } else {
            tracing::info!(%order_id, process_handle = %handle, "process started on retry");
        }

        self.get_order(order_id).await
    }
}

// Inventory administration
impl<S> OrderOrchestrator<S>
where
    S: Catalog + OrderStore + InventoryLedger,
{
    /// Returns `quantity` units to a product's stock, e.g. after a
    /// cancelled order was taken back, and reports the new stock.
    #[tracing::instrument(skip(self))]
    pub async fn restock(&self, product_id: ProductId, quantity: u32) -> Result<u32> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity { quantity }.into());
        }

        match self.store.release(product_id, quantity).await {
            Ok(()) => {}
            Err(StoreError::ProductUnavailable(id)) => {
                return Err(FulfillmentError::ProductNotFound(id));
            }
            Err(e) => return Err(e.into()),
        }

        let stock = self
            .store
            .stock(product_id)
            .await?
            .ok_or(FulfillmentError::ProductNotFound(product_id))?;
        tracing::info!(%product_id, quantity, stock, "stock released");
        Ok(stock)
    }
}

fn rejection_reason(error: &FulfillmentError) -> &'static str {
    match error {
        FulfillmentError::InvalidOrder(_) => "invalid_order",
        FulfillmentError::ProductNotFound(_) => "product_not_found",
        FulfillmentError::InsufficientStock { .. } => "insufficient_stock",
        _ => "internal",
    }
}
