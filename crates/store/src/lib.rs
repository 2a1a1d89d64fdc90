//! Persistence for the storefront order core.
//!
//! The traits in [`store`] are the seams the orchestrator depends on. Two
//! implementations are provided: [`InMemoryStore`] for tests and local runs,
//! and [`PostgresStore`] backed by `sqlx`.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use query::{OrderQuery, SortOrder};
pub use store::{
    Catalog, InventoryLedger, OrderStore, OrderStoreExt, PaymentStore, reservation_plan,
};
