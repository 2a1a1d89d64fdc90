use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, PaymentId, ProductId};
use domain::{Order, PaymentRecord, PaymentStatus, Product};
use tokio::sync::RwLock;

use crate::store::{
    Catalog, InventoryLedger, OrderStore, PaymentStore, record_reservation, reservation_plan,
};
use crate::{OrderQuery, Result, SortOrder, StoreError};

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    // Insertion sequence breaks ties between equal timestamps.
    orders: HashMap<OrderId, (u64, Order)>,
    payments: HashMap<PaymentId, (u64, PaymentRecord)>,
    next_seq: u64,
    fail_on_write: bool,
    fail_on_order_read: bool,
}

impl State {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_on_write {
            return Err(StoreError::Unavailable);
        }
        Ok(())
    }

    fn check_order_readable(&self) -> Result<()> {
        if self.fail_on_order_read {
            return Err(StoreError::Unavailable);
        }
        Ok(())
    }
}

/// In-memory store implementation for testing and local runs.
///
/// All tables sit behind one lock, so every write, including a whole order
/// placement, is a single critical section.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a catalog product.
    pub async fn upsert_product(&self, product: Product) {
        self.state
            .write()
            .await
            .products
            .insert(product.id, product);
    }

    /// Inserts or replaces several catalog products.
    pub async fn seed_products(&self, products: impl IntoIterator<Item = Product>) {
        let mut state = self.state.write().await;
        for product in products {
            state.products.insert(product.id, product);
        }
    }

    /// Marks a product active or inactive.
    pub async fn set_product_active(&self, product_id: ProductId, active: bool) {
        if let Some(product) = self.state.write().await.products.get_mut(&product_id) {
            product.active = active;
        }
    }

    /// Configures the store to fail every write.
    pub async fn set_fail_on_write(&self, fail: bool) {
        self.state.write().await.fail_on_write = fail;
    }

    /// Configures the store to fail every order read. Catalog reads and
    /// writes are unaffected.
    pub async fn set_fail_on_order_read(&self, fail: bool) {
        self.state.write().await.fail_on_order_read = fail;
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl Catalog for InMemoryStore {
    async fn get_active_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let state = self.state.read().await;
        Ok(state
            .products
            .get(&product_id)
            .filter(|p| p.active)
            .cloned())
    }
}

#[async_trait]
impl InventoryLedger for InMemoryStore {
    async fn reserve(&self, product_id: ProductId, quantity: u32) -> Result<bool> {
        let mut state = self.state.write().await;
        state.check_writable()?;

        let reserved = match state.products.get_mut(&product_id) {
            Some(product) if product.active && product.stock >= quantity => {
                product.stock -= quantity;
                true
            }
            _ => false,
        };
        record_reservation(reserved);
        Ok(reserved)
    }

    async fn release(&self, product_id: ProductId, quantity: u32) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_writable()?;

        let product = state
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductUnavailable(product_id))?;
        product.stock = product.stock.saturating_add(quantity);
        Ok(())
    }

    async fn stock(&self, product_id: ProductId) -> Result<Option<u32>> {
        let state = self.state.read().await;
        Ok(state.products.get(&product_id).map(|p| p.stock))
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn place_order(&self, order: &Order) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_writable()?;

        if state.orders.contains_key(&order.id()) {
            return Err(StoreError::DuplicateOrder(order.id()));
        }

        let plan = reservation_plan(order);

        // Check every line before touching any stock.
        for &(product_id, requested) in &plan {
            let product = state
                .products
                .get(&product_id)
                .filter(|p| p.active)
                .ok_or(StoreError::ProductUnavailable(product_id))?;
            if product.stock < requested {
                record_reservation(false);
                return Err(StoreError::InsufficientStock {
                    product_id,
                    available: product.stock,
                    requested,
                });
            }
        }

        for &(product_id, requested) in &plan {
            if let Some(product) = state.products.get_mut(&product_id) {
                product.stock -= requested;
                record_reservation(true);
            }
        }

        let seq = state.next_seq();
        state.orders.insert(order.id(), (seq, order.clone()));
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        state.check_order_readable()?;
        Ok(state.orders.get(&order_id).map(|(_, order)| order.clone()))
    }

    async fn query_orders(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        state.check_order_readable()?;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|(_, order)| query.matches(order))
            .collect();

        orders.sort_by(|(a_seq, a), (b_seq, b)| {
            a.created_at()
                .cmp(&b.created_at())
                .then(a_seq.cmp(b_seq))
        });
        if query.sort == SortOrder::NewestFirst {
            orders.reverse();
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(orders
            .into_iter()
            .take(limit)
            .map(|(_, order)| order.clone())
            .collect())
    }

    async fn save_order(&self, order: &Order) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_writable()?;

        let (_, stored) = state
            .orders
            .get_mut(&order.id())
            .ok_or(StoreError::OrderNotFound(order.id()))?;

        // Keep whatever handle is stored; only status and tracking move here.
        let handle = stored.process_handle().map(str::to_string);
        let mut updated = order.clone();
        if let Some(handle) = handle
            && updated.process_handle().is_none()
        {
            updated.attach_process_handle(handle);
        }
        *stored = updated;
        Ok(())
    }

    async fn attach_process_handle(&self, order_id: OrderId, handle: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        state.check_writable()?;

        let (_, stored) = state
            .orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;
        Ok(stored.attach_process_handle(handle))
    }
}

#[async_trait]
impl PaymentStore for InMemoryStore {
    async fn insert_payment(&self, payment: &PaymentRecord) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_writable()?;

        if !state.orders.contains_key(&payment.order_id) {
            return Err(StoreError::OrderNotFound(payment.order_id));
        }
        let seq = state.next_seq();
        state.payments.insert(payment.id, (seq, payment.clone()));
        Ok(())
    }

    async fn get_payment(&self, payment_id: PaymentId) -> Result<Option<PaymentRecord>> {
        let state = self.state.read().await;
        Ok(state.payments.get(&payment_id).map(|(_, p)| p.clone()))
    }

    async fn find_payment_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentRecord>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .find(|(_, p)| p.transaction_id.as_deref() == Some(transaction_id))
            .map(|(_, p)| p.clone()))
    }

    async fn update_payment_status(
        &self,
        payment_id: PaymentId,
        status: PaymentStatus,
    ) -> Result<PaymentRecord> {
        let mut state = self.state.write().await;
        state.check_writable()?;

        let (_, payment) = state
            .payments
            .get_mut(&payment_id)
            .ok_or(StoreError::PaymentNotFound(payment_id))?;
        payment.status = status;
        payment.updated_at = Utc::now().max(payment.updated_at);
        Ok(payment.clone())
    }

    async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<PaymentRecord>> {
        let state = self.state.read().await;
        let mut payments: Vec<_> = state
            .payments
            .values()
            .filter(|(_, p)| p.order_id == order_id)
            .collect();
        payments.sort_by(|(a_seq, a), (b_seq, b)| {
            b.created_at
                .cmp(&a.created_at)
                .then(b_seq.cmp(a_seq))
        });
        Ok(payments.into_iter().map(|(_, p)| p.clone()).collect())
    }
}
