//! Postgres-backed transactional store.
//!
//! Each [`StoreTx`] is one database transaction. Row locks are taken with
//! `SELECT ... FOR UPDATE`, and every session sets a `lock_timeout` so lock
//! waits surface as transient errors instead of hanging.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (lock not available) | `55P03` | `Transient` |
//! | Database (serialization failure) | `40001` | `Transient` |
//! | Database (deadlock detected) | `40P01` | `Transient` |
//! | Database (query canceled) | `57014` | `Timeout` |
//! | Database (other) | Any other | `Database` |
//! | PoolTimedOut | N/A | `Timeout` |
//! | Io | N/A | `Transient` |
//! | ColumnDecode / Decode / ColumnNotFound | N/A | `Decode` |
//! | Other | N/A | `Database` |

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use duka_core::{
    CategoryId, InventoryRequestId, InventoryTransactionId, Location, ProductId, SaleId,
    SaleItemId, SaleReturnId, SaleReturnItemId, UserId,
};
use duka_inventory::{InventoryRecord, InventoryRequest, InventoryTransaction, RequestStatus};
use duka_products::{Category, Product};
use duka_sales::{Sale, SaleFilter, SaleItem, SaleReturn, SaleReturnItem};

use super::{Pagination, RetailStore, StoreError, StoreTx, TransactionFilter};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const SALE_COLUMNS: &str = "id, customer_name, customer_phone, customer_email, location, \
     total_amount, payment_method, payment_reference, status, created_by, approved_by, \
     fulfilling_request_id, created_at, updated_at";

const PRODUCT_COLUMNS: &str =
    "id, name, description, min_stock_level, category_id, created_at, updated_at";

const REQUEST_COLUMNS: &str = "id, product_id, location, quantity, requested_by, notes, status, \
     sale_id, created_at, resolved_at, resolved_by";

/// Postgres-backed retail store.
///
/// `PgPool` is internally reference counted, so clones share one pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        lock_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool, lock_timeout))
    }

    /// Apply the bundled schema. Safe to run on every start.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl RetailStore for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_lock_timeout", e))?;

        Ok(Box::new(PostgresTx { tx }))
    }
}

struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn insert_category(&mut self, category: &Category) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO categories (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(category.id.as_uuid())
            .bind(&category.name)
            .bind(category.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_category", e))?;
        Ok(())
    }

    async fn get_category(&mut self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        sqlx::query("SELECT id, name, created_at FROM categories WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_category", e))?
            .map(|row| Category::from_pg_row(&row))
            .transpose()
    }

    async fn list_categories(&mut self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query("SELECT id, name, created_at FROM categories ORDER BY name")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_categories", e))?;
        decode_all(&rows)
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, min_stock_level, category_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.min_stock_level)
        .bind(product.category_id.map(Uuid::from))
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE products
            SET name = $2, description = $3, min_stock_level = $4, category_id = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.min_stock_level)
        .bind(product.category_id.map(Uuid::from))
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;
        Ok(())
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?
            .map(|row| Product::from_pg_row(&row))
            .transpose()
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_product", e))?
        .map(|row| Product::from_pg_row(&row))
        .transpose()
    }

    async fn list_products(&mut self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name, id"
        ))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;
        decode_all(&rows)
    }

    #[instrument(skip(self), fields(product_id = %product_id, location = %location), err)]
    async fn lock_inventory(
        &mut self,
        product_id: ProductId,
        location: Location,
    ) -> Result<Option<InventoryRecord>, StoreError> {
        // FOR UPDATE cannot lock a missing row, so a first write on a pair
        // claims it with a zero placeholder. Concurrent claimers block on the
        // primary key until this transaction ends. The placeholder is reported
        // as absent and disappears with a rollback.
        let claimed = sqlx::query(
            r#"
            INSERT INTO inventory (product_id, location, quantity, updated_at)
            VALUES ($1, $2, 0, now())
            ON CONFLICT (product_id, location) DO NOTHING
            RETURNING product_id
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(location.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("claim_inventory", e))?;
        if claimed.is_some() {
            debug!("claimed new inventory row");
            return Ok(None);
        }

        sqlx::query(
            r#"
            SELECT product_id, location, quantity, updated_at
            FROM inventory
            WHERE product_id = $1 AND location = $2
            FOR UPDATE
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(location.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_inventory", e))?
        .map(|row| InventoryRecord::from_pg_row(&row))
        .transpose()
    }

    async fn upsert_inventory(&mut self, record: &InventoryRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO inventory (product_id, location, quantity, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (product_id, location)
            DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.product_id.as_uuid())
        .bind(record.location.as_str())
        .bind(record.quantity)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_inventory", e))?;
        Ok(())
    }

    async fn insert_inventory_transaction(
        &mut self,
        transaction: &InventoryTransaction,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO inventory_transactions (
                id, product_id, transaction_type, from_location, to_location,
                quantity, created_by, notes, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(transaction.id.as_uuid())
        .bind(transaction.product_id.as_uuid())
        .bind(transaction.transaction_type.as_str())
        .bind(transaction.from_location.map(|l| l.as_str()))
        .bind(transaction.to_location.map(|l| l.as_str()))
        .bind(transaction.quantity)
        .bind(transaction.created_by.as_uuid())
        .bind(&transaction.notes)
        .bind(transaction.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_inventory_transaction", e))?;
        Ok(())
    }

    async fn list_inventory(
        &mut self,
        location: Option<Location>,
    ) -> Result<Vec<InventoryRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, location, quantity, updated_at
            FROM inventory
            WHERE ($1::text IS NULL OR location = $1)
            ORDER BY product_id, location
            "#,
        )
        .bind(location.map(|l| l.as_str()))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_inventory", e))?;
        decode_all(&rows)
    }

    async fn list_inventory_transactions(
        &mut self,
        filter: &TransactionFilter,
        page: Pagination,
    ) -> Result<Vec<InventoryTransaction>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, transaction_type, from_location, to_location,
                   quantity, created_by, notes, created_at
            FROM inventory_transactions
            WHERE ($1::uuid IS NULL OR product_id = $1)
              AND ($2::text IS NULL OR from_location = $2 OR to_location = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(filter.product_id.map(Uuid::from))
        .bind(filter.location.map(|l| l.as_str()))
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_inventory_transactions", e))?;
        decode_all(&rows)
    }

    async fn insert_inventory_request(&mut self, request: &InventoryRequest) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO inventory_requests ({REQUEST_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(request.id.as_uuid())
        .bind(request.product_id.as_uuid())
        .bind(request.location.as_str())
        .bind(request.quantity)
        .bind(request.requested_by.as_uuid())
        .bind(&request.notes)
        .bind(request.status.as_str())
        .bind(request.sale_id.map(Uuid::from))
        .bind(request.created_at)
        .bind(request.resolved_at)
        .bind(request.resolved_by.map(Uuid::from))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_inventory_request", e))?;
        Ok(())
    }

    async fn lock_inventory_request(
        &mut self,
        id: InventoryRequestId,
    ) -> Result<Option<InventoryRequest>, StoreError> {
        sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM inventory_requests WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_inventory_request", e))?
        .map(|row| InventoryRequest::from_pg_row(&row))
        .transpose()
    }

    async fn update_inventory_request(&mut self, request: &InventoryRequest) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE inventory_requests
            SET status = $2, sale_id = $3, resolved_at = $4, resolved_by = $5
            WHERE id = $1
            "#,
        )
        .bind(request.id.as_uuid())
        .bind(request.status.as_str())
        .bind(request.sale_id.map(Uuid::from))
        .bind(request.resolved_at)
        .bind(request.resolved_by.map(Uuid::from))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_inventory_request", e))?;
        Ok(())
    }

    async fn list_inventory_requests(
        &mut self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<InventoryRequest>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM inventory_requests \
             WHERE ($1::text IS NULL OR status = $1) \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_inventory_requests", e))?;
        decode_all(&rows)
    }

    #[instrument(skip(self, sale, items), fields(sale_id = %sale.id, item_count = items.len()), err)]
    async fn insert_sale(&mut self, sale: &Sale, items: &[SaleItem]) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO sales ({SALE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(sale.id.as_uuid())
        .bind(&sale.customer_name)
        .bind(&sale.customer_phone)
        .bind(&sale.customer_email)
        .bind(sale.location.as_str())
        .bind(to_db_amount(sale.total_amount)?)
        .bind(sale.payment_method.as_str())
        .bind(&sale.payment_reference)
        .bind(sale.status.as_str())
        .bind(sale.created_by.as_uuid())
        .bind(sale.approved_by.map(Uuid::from))
        .bind(sale.fulfilling_request_id.map(Uuid::from))
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_sale", e))?;

        for (position, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sale_items (id, sale_id, position, product_id, quantity, unit_price, total_price)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(item.sale_id.as_uuid())
            .bind(position as i32)
            .bind(item.product_id.as_uuid())
            .bind(item.quantity)
            .bind(to_db_amount(item.unit_price)?)
            .bind(to_db_amount(item.total_price)?)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_sale_item", e))?;
        }
        Ok(())
    }

    async fn get_sale(&mut self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        sqlx::query(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_sale", e))?
            .map(|row| Sale::from_pg_row(&row))
            .transpose()
    }

    #[instrument(skip(self), fields(sale_id = %id), err)]
    async fn lock_sale(&mut self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        sqlx::query(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_sale", e))?
        .map(|row| Sale::from_pg_row(&row))
        .transpose()
    }

    async fn update_sale(&mut self, sale: &Sale) -> Result<(), StoreError> {
        sqlx::query("UPDATE sales SET status = $2, approved_by = $3, updated_at = $4 WHERE id = $1")
            .bind(sale.id.as_uuid())
            .bind(sale.status.as_str())
            .bind(sale.approved_by.map(Uuid::from))
            .bind(sale.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("update_sale", e))?;
        Ok(())
    }

    async fn sale_items(&mut self, sale_id: SaleId) -> Result<Vec<SaleItem>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, sale_id, product_id, quantity, unit_price, total_price
            FROM sale_items
            WHERE sale_id = $1
            ORDER BY position
            "#,
        )
        .bind(sale_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("sale_items", e))?;
        decode_all(&rows)
    }

    async fn list_sales(&mut self, filter: &SaleFilter, page: Pagination) -> Result<Vec<Sale>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SALE_COLUMNS} FROM sales \
             WHERE (CASE WHEN $1::text IS NOT NULL THEN status = $1 \
                         ELSE ($3 OR status <> 'fully_returned') END) \
               AND ($2::text IS NULL OR location = $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $4 OFFSET $5"
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.location.map(|l| l.as_str()))
        .bind(filter.include_fully_returned)
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_sales", e))?;
        decode_all(&rows)
    }

    #[instrument(
        skip(self, sale_return, items),
        fields(sale_id = %sale_return.sale_id, return_id = %sale_return.id, item_count = items.len()),
        err
    )]
    async fn insert_sale_return(
        &mut self,
        sale_return: &SaleReturn,
        items: &[SaleReturnItem],
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sale_returns (id, sale_id, created_by, notes, total_refund_amount, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(sale_return.id.as_uuid())
        .bind(sale_return.sale_id.as_uuid())
        .bind(sale_return.created_by.as_uuid())
        .bind(&sale_return.notes)
        .bind(to_db_amount(sale_return.total_refund_amount)?)
        .bind(sale_return.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_sale_return", e))?;

        for (position, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sale_return_items (
                    id, sale_return_id, sale_item_id, position, quantity_returned, unit_price, total_price
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(item.sale_return_id.as_uuid())
            .bind(item.sale_item_id.as_uuid())
            .bind(position as i32)
            .bind(item.quantity_returned)
            .bind(to_db_amount(item.unit_price)?)
            .bind(to_db_amount(item.total_price)?)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_sale_return_item", e))?;
        }
        Ok(())
    }

    async fn sale_returns(&mut self, sale_id: SaleId) -> Result<Vec<SaleReturn>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, sale_id, created_by, notes, total_refund_amount, created_at
            FROM sale_returns
            WHERE sale_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(sale_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("sale_returns", e))?;
        decode_all(&rows)
    }

    async fn sale_return_items(&mut self, sale_id: SaleId) -> Result<Vec<SaleReturnItem>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT ri.id, ri.sale_return_id, ri.sale_item_id, ri.quantity_returned,
                   ri.unit_price, ri.total_price
            FROM sale_return_items ri
            JOIN sale_returns r ON r.id = ri.sale_return_id
            WHERE r.sale_id = $1
            ORDER BY r.created_at, r.id, ri.position
            "#,
        )
        .bind(sale_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("sale_return_items", e))?;
        decode_all(&rows)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        debug!("store transaction committed");
        Ok(())
    }
}

/// Manual row mapping, kept next to the queries that select the columns.
trait FromPgRow: Sized {
    fn from_pg_row(row: &PgRow) -> Result<Self, StoreError>;
}

fn decode_all<T: FromPgRow>(rows: &[PgRow]) -> Result<Vec<T>, StoreError> {
    rows.iter().map(T::from_pg_row).collect()
}

fn col<'r, T>(row: &'r PgRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Decode(format!("failed to read {name}: {e}")))
}

fn parsed<T>(row: &PgRow, name: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = col(row, name)?;
    raw.parse()
        .map_err(|e| StoreError::Decode(format!("invalid {name} '{raw}': {e}")))
}

fn parsed_opt<T>(row: &PgRow, name: &str) -> Result<Option<T>, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: Option<String> = col(row, name)?;
    raw.map(|r| {
        r.parse()
            .map_err(|e| StoreError::Decode(format!("invalid {name} '{r}': {e}")))
    })
    .transpose()
}

fn amount(row: &PgRow, name: &str) -> Result<u64, StoreError> {
    let raw: i64 = col(row, name)?;
    u64::try_from(raw).map_err(|_| StoreError::Decode(format!("negative amount in {name}: {raw}")))
}

fn to_db_amount(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Database(format!("amount {value} out of range")))
}

fn opt_id<T: From<Uuid>>(row: &PgRow, name: &str) -> Result<Option<T>, StoreError> {
    Ok(col::<Option<Uuid>>(row, name)?.map(T::from))
}

fn id<T: From<Uuid>>(row: &PgRow, name: &str) -> Result<T, StoreError> {
    Ok(T::from(col::<Uuid>(row, name)?))
}

impl FromPgRow for Category {
    fn from_pg_row(row: &PgRow) -> Result<Self, StoreError> {
        Ok(Category {
            id: id::<CategoryId>(row, "id")?,
            name: col(row, "name")?,
            created_at: col(row, "created_at")?,
        })
    }
}

impl FromPgRow for Product {
    fn from_pg_row(row: &PgRow) -> Result<Self, StoreError> {
        Ok(Product {
            id: id::<ProductId>(row, "id")?,
            name: col(row, "name")?,
            description: col(row, "description")?,
            min_stock_level: col(row, "min_stock_level")?,
            category_id: opt_id::<CategoryId>(row, "category_id")?,
            created_at: col(row, "created_at")?,
            updated_at: col(row, "updated_at")?,
        })
    }
}

impl FromPgRow for InventoryRecord {
    fn from_pg_row(row: &PgRow) -> Result<Self, StoreError> {
        Ok(InventoryRecord {
            product_id: id::<ProductId>(row, "product_id")?,
            location: parsed(row, "location")?,
            quantity: col(row, "quantity")?,
            updated_at: col(row, "updated_at")?,
        })
    }
}

impl FromPgRow for InventoryTransaction {
    fn from_pg_row(row: &PgRow) -> Result<Self, StoreError> {
        Ok(InventoryTransaction {
            id: id::<InventoryTransactionId>(row, "id")?,
            product_id: id::<ProductId>(row, "product_id")?,
            transaction_type: parsed(row, "transaction_type")?,
            from_location: parsed_opt(row, "from_location")?,
            to_location: parsed_opt(row, "to_location")?,
            quantity: col(row, "quantity")?,
            created_by: id::<UserId>(row, "created_by")?,
            notes: col(row, "notes")?,
            created_at: col(row, "created_at")?,
        })
    }
}

impl FromPgRow for InventoryRequest {
    fn from_pg_row(row: &PgRow) -> Result<Self, StoreError> {
        Ok(InventoryRequest {
            id: id::<InventoryRequestId>(row, "id")?,
            product_id: id::<ProductId>(row, "product_id")?,
            location: parsed(row, "location")?,
            quantity: col(row, "quantity")?,
            requested_by: id::<UserId>(row, "requested_by")?,
            notes: col(row, "notes")?,
            status: parsed(row, "status")?,
            sale_id: opt_id::<SaleId>(row, "sale_id")?,
            created_at: col(row, "created_at")?,
            resolved_at: col(row, "resolved_at")?,
            resolved_by: opt_id::<UserId>(row, "resolved_by")?,
        })
    }
}

impl FromPgRow for Sale {
    fn from_pg_row(row: &PgRow) -> Result<Self, StoreError> {
        Ok(Sale {
            id: id::<SaleId>(row, "id")?,
            customer_name: col(row, "customer_name")?,
            customer_phone: col(row, "customer_phone")?,
            customer_email: col(row, "customer_email")?,
            location: parsed(row, "location")?,
            total_amount: amount(row, "total_amount")?,
            payment_method: parsed(row, "payment_method")?,
            payment_reference: col(row, "payment_reference")?,
            status: parsed(row, "status")?,
            created_by: id::<UserId>(row, "created_by")?,
            approved_by: opt_id::<UserId>(row, "approved_by")?,
            fulfilling_request_id: opt_id::<InventoryRequestId>(row, "fulfilling_request_id")?,
            created_at: col(row, "created_at")?,
            updated_at: col(row, "updated_at")?,
        })
    }
}

impl FromPgRow for SaleItem {
    fn from_pg_row(row: &PgRow) -> Result<Self, StoreError> {
        Ok(SaleItem {
            id: id::<SaleItemId>(row, "id")?,
            sale_id: id::<SaleId>(row, "sale_id")?,
            product_id: id::<ProductId>(row, "product_id")?,
            quantity: col(row, "quantity")?,
            unit_price: amount(row, "unit_price")?,
            total_price: amount(row, "total_price")?,
        })
    }
}

impl FromPgRow for SaleReturn {
    fn from_pg_row(row: &PgRow) -> Result<Self, StoreError> {
        Ok(SaleReturn {
            id: id::<SaleReturnId>(row, "id")?,
            sale_id: id::<SaleId>(row, "sale_id")?,
            created_by: id::<UserId>(row, "created_by")?,
            notes: col(row, "notes")?,
            total_refund_amount: amount(row, "total_refund_amount")?,
            created_at: col(row, "created_at")?,
        })
    }
}

impl FromPgRow for SaleReturnItem {
    fn from_pg_row(row: &PgRow) -> Result<Self, StoreError> {
        Ok(SaleReturnItem {
            id: id::<SaleReturnItemId>(row, "id")?,
            sale_return_id: id::<SaleReturnId>(row, "sale_return_id")?,
            sale_item_id: id::<SaleItemId>(row, "sale_item_id")?,
            quantity_returned: col(row, "quantity_returned")?,
            unit_price: amount(row, "unit_price")?,
            total_price: amount(row, "total_price")?,
        })
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // lock_not_available, serialization_failure, deadlock_detected
                Some("55P03") | Some("40001") | Some("40P01") => StoreError::Transient(msg),
                // query_canceled (statement timeout)
                Some("57014") => StoreError::Timeout(msg),
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Timeout(format!("connection pool timed out in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Transient(format!("io error in {operation}: {e}")),
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Decode(format!("decode error in {operation}: {err}"))
        }
        _ => StoreError::Database(format!("sqlx error in {operation}: {err}")),
    }
}
