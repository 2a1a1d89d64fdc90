//! Integration tests for order creation, process linkage and the
//! administrative operations, against the in-memory store and engine.

use std::sync::Arc;
use std::time::Duration;

use common::{OrderId, ProductId, UserId};
use domain::{
    Money, OrderError, OrderRequest, OrderStatus, Product, RequestedItem, ShippingAddress,
};
use fulfillment::{
    FulfillmentError, InMemoryProcessEngine, OrderOrchestrator, ProcessState, ProcessUpdate,
};
use store::{InMemoryStore, InventoryLedger};

struct TestHarness {
    orchestrator: Arc<OrderOrchestrator<InMemoryStore>>,
    store: InMemoryStore,
    engine: InMemoryProcessEngine,
}

impl TestHarness {
    fn new() -> Self {
        let store = InMemoryStore::new();
        let engine = InMemoryProcessEngine::new();
        let orchestrator = Arc::new(OrderOrchestrator::new(
            store.clone(),
            Arc::new(engine.clone()),
        ));

        Self {
            orchestrator,
            store,
            engine,
        }
    }

    async fn product(&self, name: &str, cents: i64, stock: u32) -> Product {
        let product = Product::new(ProductId::new(), name, Money::from_cents(cents), stock);
        self.store.upsert_product(product.clone()).await;
        product
    }

    async fn stock(&self, product: &Product) -> u32 {
        self.store.stock(product.id).await.unwrap().unwrap()
    }
}

fn address() -> ShippingAddress {
    ShippingAddress {
        first_name: "John".to_string(),
        last_name: "Doe".to_string(),
        address: "123 Main St".to_string(),
        city: "New York".to_string(),
        state: "NY".to_string(),
        zip: "10001".to_string(),
        country: "United States".to_string(),
    }
}

fn request(items: &[(&Product, u32)]) -> OrderRequest {
    OrderRequest::new(
        items
            .iter()
            .map(|(p, q)| RequestedItem::new(p.id, *q))
            .collect(),
        address(),
    )
}

mod creation {
    use super::*;

    #[tokio::test]
    async fn creates_priced_order_and_starts_process() {
        let h = TestHarness::new();
        let widget = h.product("Widget", 1000, 10).await;
        let mut gadget = Product::new(ProductId::new(), "Gadget", Money::from_cents(2000), 5);
        gadget.discount_percent = 15;
        h.store.upsert_product(gadget.clone()).await;

        let user = UserId::new();
        let order = h
            .orchestrator
            .create(user, request(&[(&widget, 2), (&gadget, 1)]))
            .await
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.total().cents(), 2 * 1000 + 1700);
        assert_eq!(order.lines()[1].unit_price.cents(), 1700);
        assert_eq!(order.process_handle(), Some("PROC-0001"));
        assert!(order.is_owned_by(user));

        assert_eq!(h.stock(&widget).await, 8);
        assert_eq!(h.stock(&gadget).await, 4);
    }

    #[tokio::test]
    async fn unknown_or_inactive_product_is_rejected_without_effects() {
        let h = TestHarness::new();
        let widget = h.product("Widget", 1000, 10).await;
        let mut retired = h.product("Retired", 500, 10).await;
        retired.active = false;
        h.store.upsert_product(retired.clone()).await;

        let result = h
            .orchestrator
            .create(UserId::new(), request(&[(&widget, 1), (&retired, 1)]))
            .await;
        assert!(matches!(result, Err(FulfillmentError::ProductNotFound(id)) if id == retired.id));

        let ghost = Product::new(ProductId::new(), "Ghost", Money::from_cents(1), 1);
        let result = h
            .orchestrator
            .create(UserId::new(), request(&[(&ghost, 1)]))
            .await;
        assert!(matches!(result, Err(FulfillmentError::ProductNotFound(_))));

        assert_eq!(h.stock(&widget).await, 10);
        assert_eq!(h.store.order_count().await, 0);
        assert_eq!(h.engine.started_count(), 0);
    }

    #[tokio::test]
    async fn any_line_over_stock_rejects_whole_order() {
        let h = TestHarness::new();
        let widget = h.product("Widget", 1000, 10).await;
        let gadget = h.product("Gadget", 500, 2).await;

        let result = h
            .orchestrator
            .create(UserId::new(), request(&[(&widget, 3), (&gadget, 3)]))
            .await;

        match result {
            Err(e @ FulfillmentError::InsufficientStock { .. }) => assert_eq!(
                e.to_string(),
                "Insufficient stock for product Gadget. Available: 2, Requested: 3"
            ),
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(h.stock(&widget).await, 10);
        assert_eq!(h.stock(&gadget).await, 2);
    }

    #[tokio::test]
    async fn duplicate_lines_are_checked_against_summed_quantity() {
        let h = TestHarness::new();
        let widget = h.product("Widget", 1000, 4).await;

        let result = h
            .orchestrator
            .create(UserId::new(), request(&[(&widget, 3), (&widget, 2)]))
            .await;

        assert!(matches!(
            result,
            Err(FulfillmentError::InsufficientStock {
                available: 4,
                requested: 5,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected() {
        let h = TestHarness::new();
        let widget = h.product("Widget", 1000, 4).await;

        let empty = OrderRequest::new(vec![], address());
        assert!(matches!(
            h.orchestrator.create(UserId::new(), empty).await,
            Err(FulfillmentError::InvalidOrder(_))
        ));

        let zero = request(&[(&widget, 0)]);
        assert!(matches!(
            h.orchestrator.create(UserId::new(), zero).await,
            Err(FulfillmentError::InvalidOrder(_))
        ));

        let mut blank = request(&[(&widget, 1)]);
        blank.shipping_address.zip = "  ".to_string();
        assert!(matches!(
            h.orchestrator.create(UserId::new(), blank).await,
            Err(FulfillmentError::InvalidOrder(_))
        ));

        assert_eq!(h.stock(&widget).await, 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creations_never_oversell() {
        let h = TestHarness::new();
        let widget = h.product("Widget", 1000, 5).await;

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..25 {
            let orchestrator = h.orchestrator.clone();
            let request = request(&[(&widget, 1)]);
            tasks.spawn(async move { orchestrator.create(UserId::new(), request).await });
        }

        let mut created = 0;
        let mut rejected = 0;
        while let Some(result) = tasks.join_next().await {
            match result.unwrap() {
                Ok(_) => created += 1,
                Err(FulfillmentError::InsufficientStock { .. }) => rejected += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(created, 5);
        assert_eq!(rejected, 20);
        assert_eq!(h.stock(&widget).await, 0);
        assert_eq!(h.store.order_count().await, 5);
    }

    #[tokio::test]
    async fn overflowing_total_is_rejected_without_effects() {
        let h = TestHarness::new();
        let bulk = h.product("Bulk", 5_000_000_000, 2_000_000_000).await;

        let result = h
            .orchestrator
            .create(UserId::new(), request(&[(&bulk, 2_000_000_000)]))
            .await;

        assert!(matches!(
            result,
            Err(FulfillmentError::InvalidOrder(OrderError::AmountOverflow))
        ));
        assert_eq!(h.store.order_count().await, 0);
        assert_eq!(h.stock(&bulk).await, 2_000_000_000);
        assert_eq!(h.engine.started_count(), 0);
    }

    #[tokio::test]
    async fn store_failure_is_reported_as_store_error() {
        let h = TestHarness::new();
        let widget = h.product("Widget", 1000, 5).await;
        h.store.set_fail_on_write(true).await;

        let result = h
            .orchestrator
            .create(UserId::new(), request(&[(&widget, 1)]))
            .await;

        assert!(matches!(result, Err(FulfillmentError::Store(_))));
    }
}

mod process_linkage {
    use super::*;

    #[tokio::test]
    async fn engine_failure_does_not_fail_creation() {
        let h = TestHarness::new();
        let widget = h.product("Widget", 1000, 5).await;
        h.engine.set_fail_on_start(true);

        let user = UserId::new();
        let order = h
            .orchestrator
            .create(user, request(&[(&widget, 1)]))
            .await
            .unwrap();

        assert!(order.process_handle().is_none());
        assert_eq!(order.status(), OrderStatus::Pending);

        let status = h.orchestrator.get_process_status(order.id()).await;
        assert!(matches!(status, Err(FulfillmentError::ProcessNotFound(id)) if id == order.id()));

        let found = h.orchestrator.find_one(user, order.id()).await.unwrap();
        assert_eq!(found.id(), order.id());

        let awaiting = h.orchestrator.orders_awaiting_process().await.unwrap();
        assert_eq!(awaiting.len(), 1);
    }

    #[tokio::test]
    async fn process_status_comes_from_engine() {
        let h = TestHarness::new();
        let widget = h.product("Widget", 1000, 5).await;
        let order = h
            .orchestrator
            .create(UserId::new(), request(&[(&widget, 1)]))
            .await
            .unwrap();
        let handle = order.process_handle().unwrap().to_string();

        h.engine.set_process_state(&handle, ProcessState::Suspended);
        let status = h.orchestrator.get_process_status(order.id()).await.unwrap();
        assert_eq!(status.process_handle, handle);
        assert_eq!(status.state, ProcessState::Suspended);

        h.engine.forget(&handle);
        let status = h.orchestrator.get_process_status(order.id()).await;
        assert!(matches!(status, Err(FulfillmentError::ProcessNotFound(_))));
    }

    #[tokio::test]
    async fn process_status_of_missing_order() {
        let h = TestHarness::new();
        let result = h.orchestrator.get_process_status(OrderId::new()).await;
        assert!(matches!(result, Err(FulfillmentError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn retry_starts_missing_process_once() {
        let h = TestHarness::new();
        let widget = h.product("Widget", 1000, 5).await;
        h.engine.set_fail_on_start(true);
        let order = h
            .orchestrator
            .create(UserId::new(), request(&[(&widget, 1)]))
            .await
            .unwrap();

        let failed = h.orchestrator.retry_process_start(order.id()).await;
        assert!(matches!(
            failed,
            Err(FulfillmentError::ProcessStartFailed { order_id, .. }) if order_id == order.id()
        ));

        h.engine.set_fail_on_start(false);
        h.engine.set_start_delay(Some(Duration::from_millis(50)));

        let (first, second) = tokio::join!(
            h.orchestrator.retry_process_start(order.id()),
            h.orchestrator.retry_process_start(order.id())
        );
        let first = first.unwrap();
        let second = second.unwrap();

        assert_eq!(h.engine.started_count(), 1);
        assert_eq!(first.process_handle(), second.process_handle());
        assert_eq!(h.engine.handles_for(order.id()).len(), 1);
        assert!(h.orchestrator.orders_awaiting_process().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn retry_during_creation_start_waits_for_it() {
        let h = TestHarness::new();
        let widget = h.product("Widget", 1000, 5).await;
        h.engine.set_start_delay(Some(Duration::from_millis(300)));

        let orchestrator = h.orchestrator.clone();
        let request = request(&[(&widget, 1)]);
        let creation =
            tokio::spawn(async move { orchestrator.create(UserId::new(), request).await });

        // The order is committed and visible before its start returns.
        let mut awaiting = Vec::new();
        for _ in 0..200 {
            awaiting = h.orchestrator.orders_awaiting_process().await.unwrap();
            if !awaiting.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(awaiting.len(), 1);
        let order_id = awaiting[0].id();

        let retried = h.orchestrator.retry_process_start(order_id).await.unwrap();
        let created = creation.await.unwrap().unwrap();

        assert_eq!(h.engine.handles_for(order_id), vec!["PROC-0001".to_string()]);
        assert_eq!(h.engine.started_count(), 1);
        assert_eq!(retried.process_handle(), Some("PROC-0001"));
        assert_eq!(created.process_handle(), Some("PROC-0001"));
    }

    #[tokio::test]
    async fn reload_failure_after_commit_returns_created_order() {
        let h = TestHarness::new();
        let widget = h.product("Widget", 1000, 5).await;
        h.store.set_fail_on_order_read(true).await;

        let order = h
            .orchestrator
            .create(UserId::new(), request(&[(&widget, 2)]))
            .await
            .unwrap();

        assert_eq!(order.process_handle(), Some("PROC-0001"));
        assert_eq!(order.total().cents(), 2000);
        assert_eq!(order.status(), OrderStatus::Pending);

        h.store.set_fail_on_order_read(false).await;
        let stored = h.orchestrator.get_order(order.id()).await.unwrap();
        assert_eq!(stored.process_handle(), Some("PROC-0001"));
        assert_eq!(h.stock(&widget).await, 3);
    }

    #[tokio::test]
    async fn retry_on_linked_order_is_a_no_op() {
        let h = TestHarness::new();
        let widget = h.product("Widget", 1000, 5).await;
        let order = h
            .orchestrator
            .create(UserId::new(), request(&[(&widget, 1)]))
            .await
            .unwrap();

        let retried = h.orchestrator.retry_process_start(order.id()).await.unwrap();

        assert_eq!(retried.process_handle(), order.process_handle());
        assert_eq!(h.engine.started_count(), 1);
    }

    #[tokio::test]
    async fn awaiting_process_lists_oldest_first() {
        let h = TestHarness::new();
        let widget = h.product("Widget", 1000, 5).await;
        h.engine.set_fail_on_start(true);

        let first = h
            .orchestrator
            .create(UserId::new(), request(&[(&widget, 1)]))
            .await
            .unwrap();
        let second = h
            .orchestrator
            .create(UserId::new(), request(&[(&widget, 1)]))
            .await
            .unwrap();

        let awaiting = h.orchestrator.orders_awaiting_process().await.unwrap();
        assert_eq!(
            awaiting.iter().map(|o| o.id()).collect::<Vec<_>>(),
            vec![first.id(), second.id()]
        );
    }
}

mod queries_and_admin {
    use super::*;

    #[tokio::test]
    async fn owner_listing_is_newest_first_and_stable() {
        let h = TestHarness::new();
        let widget = h.product("Widget", 1000, 50).await;
        let user = UserId::new();

        let mut ids = Vec::new();
        for _ in 0..3 {
            let order = h
                .orchestrator
                .create(user, request(&[(&widget, 1)]))
                .await
                .unwrap();
            ids.push(order.id());
        }
        h.orchestrator
            .create(UserId::new(), request(&[(&widget, 1)]))
            .await
            .unwrap();

        let first = h.orchestrator.list_own_orders(user).await.unwrap();
        let second = h.orchestrator.list_own_orders(user).await.unwrap();

        ids.reverse();
        assert_eq!(first.iter().map(|o| o.id()).collect::<Vec<_>>(), ids);
        assert_eq!(first, second);

        let all = h.orchestrator.list_all_orders(None).await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn foreign_orders_look_missing() {
        let h = TestHarness::new();
        let widget = h.product("Widget", 1000, 5).await;
        let order = h
            .orchestrator
            .create(UserId::new(), request(&[(&widget, 1)]))
            .await
            .unwrap();

        let result = h.orchestrator.find_one(UserId::new(), order.id()).await;
        assert!(matches!(result, Err(FulfillmentError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn tracking_number_ships_the_order() {
        let h = TestHarness::new();
        let widget = h.product("Widget", 1000, 5).await;
        let user = UserId::new();
        let order = h
            .orchestrator
            .create(user, request(&[(&widget, 1)]))
            .await
            .unwrap();

        h.orchestrator
            .add_tracking_number(order.id(), "TRACK123")
            .await
            .unwrap();

        let found = h.orchestrator.find_one(user, order.id()).await.unwrap();
        assert_eq!(found.status(), OrderStatus::Shipped);
        assert_eq!(found.tracking_number(), Some("TRACK123"));
        assert_eq!(found.process_handle(), order.process_handle());

        let blank = h.orchestrator.add_tracking_number(order.id(), " ").await;
        assert!(matches!(blank, Err(FulfillmentError::InvalidOrder(_))));
    }

    #[tokio::test]
    async fn status_updates_and_filters() {
        let h = TestHarness::new();
        let widget = h.product("Widget", 1000, 5).await;
        let a = h
            .orchestrator
            .create(UserId::new(), request(&[(&widget, 1)]))
            .await
            .unwrap();
        let b = h
            .orchestrator
            .create(UserId::new(), request(&[(&widget, 1)]))
            .await
            .unwrap();

        h.orchestrator
            .update_status(a.id(), OrderStatus::Delivered)
            .await
            .unwrap();
        // No transition graph: delivered can go back to processing.
        h.orchestrator
            .update_status(a.id(), OrderStatus::Processing)
            .await
            .unwrap();

        let processing = h
            .orchestrator
            .get_orders_by_status(OrderStatus::Processing)
            .await
            .unwrap();
        assert_eq!(processing.len(), 1);
        assert_eq!(processing[0].id(), a.id());

        let pending = h
            .orchestrator
            .list_all_orders(Some(OrderStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending[0].id(), b.id());

        let missing = h
            .orchestrator
            .update_status(OrderId::new(), OrderStatus::Cancelled)
            .await;
        assert!(matches!(missing, Err(FulfillmentError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn restock_returns_units_to_the_catalog() {
        let h = TestHarness::new();
        let widget = h.product("Widget", 1000, 2).await;
        h.orchestrator
            .create(UserId::new(), request(&[(&widget, 2)]))
            .await
            .unwrap();

        let stock = h.orchestrator.restock(widget.id, 3).await.unwrap();

        assert_eq!(stock, 3);
        assert_eq!(h.stock(&widget).await, 3);

        let zero = h.orchestrator.restock(widget.id, 0).await;
        assert!(matches!(zero, Err(FulfillmentError::InvalidOrder(_))));

        let unknown = h.orchestrator.restock(ProductId::new(), 1).await;
        assert!(matches!(unknown, Err(FulfillmentError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn process_updates_apply_status_or_tracking() {
        let h = TestHarness::new();
        let widget = h.product("Widget", 1000, 5).await;
        let order = h
            .orchestrator
            .create(UserId::new(), request(&[(&widget, 1)]))
            .await
            .unwrap();

        let processing = h
            .orchestrator
            .apply_process_update(
                order.id(),
                ProcessUpdate {
                    status: OrderStatus::Processing,
                    tracking_number: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(processing.status(), OrderStatus::Processing);

        let shipped = h
            .orchestrator
            .apply_process_update(
                order.id(),
                ProcessUpdate {
                    status: OrderStatus::Processing,
                    tracking_number: Some("1Z999".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(shipped.status(), OrderStatus::Shipped);
        assert_eq!(shipped.tracking_number(), Some("1Z999"));
    }
}
