use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId, ProductId, UserId};
use domain::{
    Money, Order, OrderLine, OrderParts, OrderStatus, PaymentRecord, PaymentStatus, Product,
    ShippingAddress,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::store::{
    Catalog, InventoryLedger, OrderStore, PaymentStore, record_reservation, reservation_plan,
};
use crate::{OrderQuery, Result, SortOrder, StoreError};

const ORDER_COLUMNS: &str = "id, user_id, total_cents, status, shipping_address, \
     tracking_number, process_handle, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, order_id, amount_cents, currency, method, status, \
     transaction_id, created_at, updated_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Inserts or replaces a catalog product.
    pub async fn upsert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, discount_percent, stock, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                discount_percent = EXCLUDED.discount_percent,
                stock = EXCLUDED.stock,
                active = EXCLUDED.active,
                updated_at = NOW()
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(i16::from(product.discount_percent))
        .bind(i64::from(product.stock))
        .bind(product.active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts or replaces several catalog products.
    pub async fn seed_products(&self, products: impl IntoIterator<Item = Product>) -> Result<()> {
        for product in products {
            self.upsert_product(&product).await?;
        }
        Ok(())
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        let discount: i16 = row.try_get("discount_percent")?;
        let stock: i32 = row.try_get("stock")?;

        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            discount_percent: u8::try_from(discount).map_err(|_| StoreError::InvalidValue {
                column: "discount_percent",
                value: i64::from(discount),
            })?,
            stock: to_u32("stock", stock)?,
            active: row.try_get("active")?,
        })
    }

    fn row_to_line(row: &PgRow) -> Result<OrderLine> {
        let quantity: i32 = row.try_get("quantity")?;
        Ok(OrderLine::new(
            ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            row.try_get::<String, _>("product_name")?,
            Money::from_cents(row.try_get("unit_price_cents")?),
            to_u32("quantity", quantity)?,
        ))
    }

    fn row_to_order(row: &PgRow, lines: Vec<OrderLine>) -> Result<Order> {
        let status: String = row.try_get("status")?;
        let address: serde_json::Value = row.try_get("shipping_address")?;
        let shipping_address: ShippingAddress = serde_json::from_value(address)?;

        let order = Order::from_parts(OrderParts {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            lines,
            total: Money::from_cents(row.try_get("total_cents")?),
            status: status.parse::<OrderStatus>()?,
            shipping_address,
            tracking_number: row.try_get("tracking_number")?,
            process_handle: row.try_get("process_handle")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })?;
        Ok(order)
    }

    fn row_to_payment(row: PgRow) -> Result<PaymentRecord> {
        let status: String = row.try_get("status")?;
        Ok(PaymentRecord {
            id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            amount: Money::from_cents(row.try_get("amount_cents")?),
            currency: row.try_get("currency")?,
            method: row.try_get("method")?,
            status: status.parse::<PaymentStatus>()?,
            transaction_id: row.try_get("transaction_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Loads the lines for the given order rows and assembles the orders,
    /// keeping the row order.
    async fn assemble_orders(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let line_rows = sqlx::query(
            r#"
            SELECT order_id, product_id, product_name, unit_price_cents, quantity
            FROM order_lines
            WHERE order_id = ANY($1)
            ORDER BY order_id, line_no ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut lines: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for row in &line_rows {
            let order_id: Uuid = row.try_get("order_id")?;
            lines
                .entry(order_id)
                .or_default()
                .push(Self::row_to_line(row)?);
        }

        rows.iter()
            .zip(ids)
            .map(|(row, id)| Self::row_to_order(row, lines.remove(&id).unwrap_or_default()))
            .collect()
    }

    /// Explains why a conditional decrement touched no row.
    async fn reservation_failure(
        tx: &mut Transaction<'_, Postgres>,
        product_id: ProductId,
        requested: u32,
    ) -> Result<StoreError> {
        let row: Option<(i32, bool)> =
            sqlx::query_as("SELECT stock, active FROM products WHERE id = $1")
                .bind(product_id.as_uuid())
                .fetch_optional(&mut **tx)
                .await?;

        Ok(match row {
            Some((stock, true)) => StoreError::InsufficientStock {
                product_id,
                available: to_u32("stock", stock)?,
                requested,
            },
            _ => StoreError::ProductUnavailable(product_id),
        })
    }
}

fn to_u32(column: &'static str, value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::InvalidValue {
        column,
        value: i64::from(value),
    })
}

#[async_trait]
impl Catalog for PostgresStore {
    async fn get_active_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, price_cents, discount_percent, stock, active
            FROM products
            WHERE id = $1 AND active
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }
}

#[async_trait]
impl InventoryLedger for PostgresStore {
    #[tracing::instrument(skip(self))]
    async fn reserve(&self, product_id: ProductId, quantity: u32) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock - $1, updated_at = NOW() \
             WHERE id = $2 AND active AND stock >= $1",
        )
        .bind(i64::from(quantity))
        .bind(product_id.as_uuid())
        .execute(&self.pool)
        .await?;

        let reserved = result.rows_affected() == 1;
        record_reservation(reserved);
        Ok(reserved)
    }

    async fn release(&self, product_id: ProductId, quantity: u32) -> Result<()> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock + $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(i64::from(quantity))
        .bind(product_id.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ProductUnavailable(product_id));
        }
        Ok(())
    }

    async fn stock(&self, product_id: ProductId) -> Result<Option<u32>> {
        let stock: Option<i32> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        stock.map(|s| to_u32("stock", s)).transpose()
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id()))]
    async fn place_order(&self, order: &Order) -> Result<()> {
        let plan = reservation_plan(order);

        // Start a transaction; dropping it without commit rolls back.
        let mut tx = self.pool.begin().await?;

        for &(product_id, requested) in &plan {
            let result = sqlx::query(
                "UPDATE products SET stock = stock - $1, updated_at = NOW() \
                 WHERE id = $2 AND active AND stock >= $1",
            )
            .bind(i64::from(requested))
            .bind(product_id.as_uuid())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                record_reservation(false);
                let error = Self::reservation_failure(&mut tx, product_id, requested).await?;
                tx.rollback().await?;
                tracing::debug!(%product_id, requested, "reservation rejected");
                return Err(error);
            }
        }

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, total_cents, status, shipping_address,
                                tracking_number, process_handle, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.user_id().as_uuid())
        .bind(order.total().cents())
        .bind(order.status().as_str())
        .bind(serde_json::to_value(order.shipping_address())?)
        .bind(order.tracking_number())
        .bind(order.process_handle())
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("orders_pkey")
            {
                return StoreError::DuplicateOrder(order.id());
            }
            StoreError::Database(e)
        })?;

        for (line_no, line) in order.lines().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, line_no, product_id, product_name,
                                         unit_price_cents, quantity)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(line_no as i32)
            .bind(line.product_id.as_uuid())
            .bind(&line.product_name)
            .bind(line.unit_price.cents())
            .bind(i64::from(line.quantity))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        for _ in &plan {
            record_reservation(true);
        }
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.assemble_orders(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn query_orders(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let mut sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.user_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND user_id = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }
        if query.awaiting_process {
            sql.push_str(" AND process_handle IS NULL");
        }

        match query.sort {
            SortOrder::NewestFirst => sql.push_str(" ORDER BY created_at DESC, id DESC"),
            SortOrder::OldestFirst => sql.push_str(" ORDER BY created_at ASC, id ASC"),
        }

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(user_id) = query.user_id {
            sqlx_query = sqlx_query.bind(user_id.as_uuid());
        }
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        self.assemble_orders(rows).await
    }

    async fn save_order(&self, order: &Order) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, tracking_number = $3, updated_at = GREATEST(updated_at, $4)
            WHERE id = $1
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.status().as_str())
        .bind(order.tracking_number())
        .bind(order.updated_at())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(order.id()));
        }
        Ok(())
    }

    async fn attach_process_handle(&self, order_id: OrderId, handle: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET process_handle = $2, updated_at = NOW()
            WHERE id = $1 AND process_handle IS NULL
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(handle)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE id = $1)")
            .bind(order_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        if exists {
            Ok(false)
        } else {
            Err(StoreError::OrderNotFound(order_id))
        }
    }
}

#[async_trait]
impl PaymentStore for PostgresStore {
    async fn insert_payment(&self, payment: &PaymentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, amount_cents, currency, method, status,
                                  transaction_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.order_id.as_uuid())
        .bind(payment.amount.cents())
        .bind(&payment.currency)
        .bind(&payment.method)
        .bind(payment.status.as_str())
        .bind(&payment.transaction_id)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return StoreError::OrderNotFound(payment.order_id);
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn get_payment(&self, payment_id: PaymentId) -> Result<Option<PaymentRecord>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(payment_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn find_payment_by_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PaymentRecord>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE transaction_id = $1");
        let row = sqlx::query(&sql)
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn update_payment_status(
        &self,
        payment_id: PaymentId,
        status: PaymentStatus,
    ) -> Result<PaymentRecord> {
        let sql = format!(
            "UPDATE payments SET status = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {PAYMENT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(payment_id.as_uuid())
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::row_to_payment(row),
            None => Err(StoreError::PaymentNotFound(payment_id)),
        }
    }

    async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<PaymentRecord>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(order_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_payment).collect()
    }
}
