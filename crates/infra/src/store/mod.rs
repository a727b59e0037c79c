//! Transactional store boundary.
//!
//! Every engine operation runs inside one [`StoreTx`]: reads, row locks and
//! writes all go through it, and nothing is visible to other transactions
//! until [`StoreTx::commit`] succeeds. Dropping a transaction without
//! committing rolls it back.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use duka_core::{
    CategoryId, InventoryRequestId, Location, ProductId, SaleId,
};
use duka_inventory::{InventoryRecord, InventoryRequest, InventoryTransaction, RequestStatus};
use duka_products::{Category, Product};
use duka_sales::{Sale, SaleFilter, SaleItem, SaleReturn, SaleReturnItem};

/// Store operation error.
///
/// Infrastructure failures only; business-rule failures are `DomainError`s.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Lock contention, serialization failure, deadlock or a dropped
    /// connection. Safe to retry the whole unit of work.
    #[error("transient store failure: {0}")]
    Transient(String),

    #[error("database error: {0}")]
    Database(String),

    /// A stored row could not be mapped back to a domain type.
    #[error("failed to decode row: {0}")]
    Decode(String),

    #[error("store operation timed out: {0}")]
    Timeout(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_) | StoreError::Timeout(_))
    }
}

/// Pagination parameters for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Pagination {
    pub const MAX_LIMIT: u32 = 1000;

    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50).clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }

    /// Apply to an already ordered in-memory sequence.
    pub fn slice<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}

/// Filter for the inventory audit trail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    #[serde(default)]
    pub product_id: Option<ProductId>,
    /// Matches either side of the movement.
    #[serde(default)]
    pub location: Option<Location>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &InventoryTransaction) -> bool {
        self.product_id.is_none_or(|p| tx.product_id == p)
            && self
                .location
                .is_none_or(|l| tx.from_location == Some(l) || tx.to_location == Some(l))
    }
}

/// Factory for store transactions.
#[async_trait]
pub trait RetailStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;
}

/// One open store transaction.
///
/// `lock_*` methods take a row lock held until commit or rollback; the plain
/// getters are consistent reads within the transaction.
#[async_trait]
pub trait StoreTx: Send {
    // Categories and products.
    async fn insert_category(&mut self, category: &Category) -> Result<(), StoreError>;
    async fn get_category(&mut self, id: CategoryId) -> Result<Option<Category>, StoreError>;
    async fn list_categories(&mut self) -> Result<Vec<Category>, StoreError>;
    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError>;
    async fn update_product(&mut self, product: &Product) -> Result<(), StoreError>;
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;
    async fn list_products(&mut self) -> Result<Vec<Product>, StoreError>;

    // Inventory ledger.
    async fn lock_inventory(
        &mut self,
        product_id: ProductId,
        location: Location,
    ) -> Result<Option<InventoryRecord>, StoreError>;
    async fn upsert_inventory(&mut self, record: &InventoryRecord) -> Result<(), StoreError>;
    async fn insert_inventory_transaction(
        &mut self,
        transaction: &InventoryTransaction,
    ) -> Result<(), StoreError>;
    async fn list_inventory(
        &mut self,
        location: Option<Location>,
    ) -> Result<Vec<InventoryRecord>, StoreError>;
    /// Newest first.
    async fn list_inventory_transactions(
        &mut self,
        filter: &TransactionFilter,
        page: Pagination,
    ) -> Result<Vec<InventoryTransaction>, StoreError>;

    // Inventory requests.
    async fn insert_inventory_request(&mut self, request: &InventoryRequest) -> Result<(), StoreError>;
    async fn lock_inventory_request(
        &mut self,
        id: InventoryRequestId,
    ) -> Result<Option<InventoryRequest>, StoreError>;
    async fn update_inventory_request(&mut self, request: &InventoryRequest) -> Result<(), StoreError>;
    /// Newest first.
    async fn list_inventory_requests(
        &mut self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<InventoryRequest>, StoreError>;

    // Sales.
    async fn insert_sale(&mut self, sale: &Sale, items: &[SaleItem]) -> Result<(), StoreError>;
    async fn get_sale(&mut self, id: SaleId) -> Result<Option<Sale>, StoreError>;
    /// Locks the sale row; returns against the sale serialize on this lock.
    async fn lock_sale(&mut self, id: SaleId) -> Result<Option<Sale>, StoreError>;
    async fn update_sale(&mut self, sale: &Sale) -> Result<(), StoreError>;
    /// Items in creation order.
    async fn sale_items(&mut self, sale_id: SaleId) -> Result<Vec<SaleItem>, StoreError>;
    /// Newest first.
    async fn list_sales(&mut self, filter: &SaleFilter, page: Pagination) -> Result<Vec<Sale>, StoreError>;

    // Returns.
    async fn insert_sale_return(
        &mut self,
        sale_return: &SaleReturn,
        items: &[SaleReturnItem],
    ) -> Result<(), StoreError>;
    /// Oldest first.
    async fn sale_returns(&mut self, sale_id: SaleId) -> Result<Vec<SaleReturn>, StoreError>;
    /// Every return item recorded against the sale's items.
    async fn sale_return_items(&mut self, sale_id: SaleId) -> Result<Vec<SaleReturnItem>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
