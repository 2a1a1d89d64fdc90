use async_trait::async_trait;
use common::{OrderId, PaymentId, ProductId, UserId};
use domain::{Order, PaymentRecord, PaymentStatus, Product};

use crate::{OrderQuery, Result};

/// Read access to the product catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Looks up a product that can currently be ordered.
    ///
    /// Returns None for unknown and for inactive products alike.
    async fn get_active_product(&self, product_id: ProductId) -> Result<Option<Product>>;
}

/// Per-product stock counts.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Decrements stock by `quantity` if the product is active and has at
    /// least that much stock.
    ///
    /// Returns true iff the decrement happened. Concurrent callers never
    /// reserve more than the stock present when they started.
    async fn reserve(&self, product_id: ProductId, quantity: u32) -> Result<bool>;

    /// Adds `quantity` back to the product's stock.
    async fn release(&self, product_id: ProductId, quantity: u32) -> Result<()>;

    /// Returns the current stock, or None for an unknown product.
    async fn stock(&self, product_id: ProductId) -> Result<Option<u32>>;
}

/// Order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order and reserves stock for each of its lines in
    /// one atomic unit.
    ///
    /// Quantities for the same product are summed and products are
    /// reserved in id order. If any reservation fails nothing is written
    /// and the error names the failing product with
    /// `InsufficientStock` or `ProductUnavailable`.
    async fn place_order(&self, order: &Order) -> Result<()>;

    /// Loads an order by id.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Lists orders matching the query.
    async fn query_orders(&self, query: OrderQuery) -> Result<Vec<Order>>;

    /// Writes the mutable fields of an existing order: status, tracking
    /// number and `updated_at`.
    ///
    /// The process handle is never written here.
    async fn save_order(&self, order: &Order) -> Result<()>;

    /// Stores the process handle if the order has none yet.
    ///
    /// Returns false when a handle was already present; the stored handle
    /// is left as it was.
    async fn attach_process_handle(&self, order_id: OrderId, handle: &str) -> Result<bool>;
}

/// Payment record persistence.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts a new payment record.
    async fn insert_payment(&self, payment: &PaymentRecord) -> Result<()>;

    async fn get_payment(&self, payment_id: PaymentId) -> Result<Option<PaymentRecord>>;

    /// Finds a payment by the provider's session or transaction id.
    async fn find_payment_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentRecord>>;

    /// Sets the payment status and returns the updated record.
    async fn update_payment_status(
        &self,
        payment_id: PaymentId,
        status: PaymentStatus,
    ) -> Result<PaymentRecord>;

    /// Lists payments for an order, newest first.
    async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<PaymentRecord>>;
}

/// Extension trait providing owner-scoped order lookups.
#[async_trait]
pub trait OrderStoreExt: OrderStore {
    /// Loads an order only if it belongs to `user_id`.
    ///
    /// Missing and foreign orders both yield None.
    async fn get_order_for_user(&self, order_id: OrderId, user_id: UserId) -> Result<Option<Order>> {
        Ok(self
            .get_order(order_id)
            .await?
            .filter(|order| order.is_owned_by(user_id)))
    }

    /// Lists a user's orders, newest first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        self.query_orders(OrderQuery::for_user(user_id)).await
    }
}

// Blanket implementation for all OrderStore implementations
impl<T: OrderStore + ?Sized> OrderStoreExt for T {}

/// Sums line quantities per product and sorts by product id.
///
/// Every reservation unit locks products in this order.
pub fn reservation_plan(order: &Order) -> Vec<(ProductId, u32)> {
    let mut plan: Vec<(ProductId, u32)> = Vec::with_capacity(order.lines().len());
    for line in order.lines() {
        match plan.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, quantity)) => *quantity = quantity.saturating_add(line.quantity),
            None => plan.push((line.product_id, line.quantity)),
        }
    }
    plan.sort_by_key(|(id, _)| *id);
    plan
}

pub(crate) fn record_reservation(reserved: bool) {
    let outcome = if reserved { "reserved" } else { "rejected" };
    metrics::counter!("inventory_reservations_total", "outcome" => outcome).increment(1);
}
