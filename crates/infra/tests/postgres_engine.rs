//! Engine tests against a live PostgreSQL database.
//!
//! Tests: Engine → PostgresStore → row locks
//!
//! Skipped unless `DATABASE_URL` points at a disposable database. Every test
//! works on freshly created products and sales, so runs can share one schema.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use tokio::sync::Mutex;

use duka_core::{DomainError, Location, ProductId, UserId};
use duka_infra::retry::RetryPolicy;
use duka_infra::{EngineConfig, EngineError, Pagination, PostgresStore, RetailEngine, TransactionFilter};
use duka_inventory::StockAdjustment;
use duka_products::NewProduct;
use duka_sales::{NewSale, NewSaleItem, PaymentMethod, ReturnLine, ReturnRequest, SaleStatus};

static MIGRATED: LazyLock<Mutex<bool>> = LazyLock::new(|| Mutex::new(false));

async fn setup() -> Option<RetailEngine> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping postgres engine test");
        return None;
    };
    let config = EngineConfig {
        tx_timeout: Duration::from_secs(30),
        lock_timeout: Duration::from_secs(10),
        retry: RetryPolicy::exponential(10, Duration::from_millis(5), Duration::from_millis(200)),
        restock_on_return: false,
    };
    let store = PostgresStore::connect(&url, 32, config.lock_timeout).await.unwrap();

    let mut migrated = MIGRATED.lock().await;
    if !*migrated {
        store.migrate().await.unwrap();
        *migrated = true;
    }
    drop(migrated);

    Some(RetailEngine::new(Arc::new(store), config))
}

fn actor() -> UserId {
    UserId::new()
}

async fn product(engine: &RetailEngine) -> ProductId {
    engine
        .create_product(NewProduct {
            name: format!("Roofing sheet {}", ProductId::new()),
            description: None,
            min_stock_level: 0,
            category_id: None,
        })
        .await
        .unwrap()
        .id
}

async fn quantity(engine: &RetailEngine, product_id: ProductId, location: Location) -> i64 {
    engine
        .list_inventory(Some(location))
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.product_id == product_id)
        .map(|r| r.quantity)
        .unwrap_or(0)
}

/// Net movement at `location` according to the audit trail.
async fn audit_fold(engine: &RetailEngine, product_id: ProductId, location: Location) -> i64 {
    engine
        .list_inventory_transactions(
            TransactionFilter {
                product_id: Some(product_id),
                location: Some(location),
            },
            Pagination::new(Some(Pagination::MAX_LIMIT), None),
        )
        .await
        .unwrap()
        .iter()
        .map(|t| t.delta_at(location))
        .sum()
}

fn sale_of(product_id: ProductId, quantity: i64) -> NewSale {
    NewSale {
        customer_name: "Otieno".into(),
        customer_phone: None,
        customer_email: None,
        location: Location::Kamulu,
        payment_method: PaymentMethod::Cash,
        payment_reference: None,
        items: vec![NewSaleItem {
            product_id,
            quantity,
            unit_price: 850,
            total_price: None,
        }],
        fulfilling_request_id: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_adjustments_on_a_new_pair_all_land() {
    let Some(engine) = setup().await else { return };
    let product_id = product(&engine).await;

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .adjust_stock(StockAdjustment::new(product_id, Location::Utawala, 1, actor()))
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(quantity(&engine, product_id, Location::Utawala).await, 20);
    assert_eq!(audit_fold(&engine, product_id, Location::Utawala).await, 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rejected_first_deduction_leaves_no_record() {
    let Some(engine) = setup().await else { return };
    let product_id = product(&engine).await;

    let err = engine
        .adjust_stock(StockAdjustment::new(product_id, Location::Kamulu, -1, actor()))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Domain(DomainError::NotFound { .. })));

    let listed = engine.list_inventory(Some(Location::Kamulu)).await.unwrap();
    assert!(listed.iter().all(|r| r.product_id != product_id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_approvals_never_oversell() {
    let Some(engine) = setup().await else { return };
    let product_id = product(&engine).await;
    engine
        .adjust_stock(StockAdjustment::new(product_id, Location::Kamulu, 5, actor()))
        .await
        .unwrap();

    let mut sale_ids = Vec::new();
    for _ in 0..10 {
        let sale = engine.create_sale(sale_of(product_id, 1), actor()).await.unwrap();
        sale_ids.push(sale.sale.id);
    }

    let tasks: Vec<_> = sale_ids
        .into_iter()
        .map(|id| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine.change_sale_status(id, SaleStatus::Approved, actor()).await
            })
        })
        .collect();

    let mut approved = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => approved += 1,
            Err(EngineError::Domain(DomainError::InsufficientInventory(_))) => {}
            Err(other) => panic!("unexpected approval failure: {other:?}"),
        }
    }

    assert_eq!(approved, 5);
    assert_eq!(quantity(&engine, product_id, Location::Kamulu).await, 0);
    assert_eq!(audit_fold(&engine, product_id, Location::Kamulu).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_returns_never_exceed_sold_quantity() {
    let Some(engine) = setup().await else { return };
    let product_id = product(&engine).await;
    engine
        .adjust_stock(StockAdjustment::new(product_id, Location::Kamulu, 5, actor()))
        .await
        .unwrap();
    let sale = engine.create_sale(sale_of(product_id, 5), actor()).await.unwrap();
    let sale = engine
        .change_sale_status(sale.sale.id, SaleStatus::Approved, actor())
        .await
        .unwrap();
    let sale_id = sale.sale.id;
    let sale_item_id = sale.items[0].sale_item_id;

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let engine = engine.clone();
            let request = ReturnRequest {
                items: vec![ReturnLine {
                    sale_item_id,
                    quantity_returned: 1,
                    unit_price: None,
                }],
                notes: None,
            };
            tokio::spawn(async move { engine.process_return(sale_id, request, actor()).await })
        })
        .collect();

    let mut accepted = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(EngineError::Domain(
                DomainError::OverReturn { .. } | DomainError::InvariantViolation(_),
            )) => {}
            Err(other) => panic!("unexpected return failure: {other:?}"),
        }
    }

    assert_eq!(accepted, 5);
    let after = engine.get_sale(sale_id).await.unwrap();
    assert_eq!(after.items[0].effective_quantity, 0);
    assert_eq!(after.sale.status, SaleStatus::FullyReturned);
    assert_eq!(engine.list_returns(sale_id).await.unwrap().len(), 5);
}
