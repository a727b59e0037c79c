use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use duka_core::{CategoryId, InventoryRequestId, Location, ProductId, SaleId};
use duka_inventory::{InventoryRecord, InventoryRequest, InventoryTransaction, RequestStatus};
use duka_products::{Category, Product};
use duka_sales::{Sale, SaleFilter, SaleItem, SaleReturn, SaleReturnItem};

use super::{Pagination, RetailStore, StoreError, StoreTx, TransactionFilter};

#[derive(Debug, Default, Clone)]
struct State {
    categories: BTreeMap<CategoryId, Category>,
    products: BTreeMap<ProductId, Product>,
    inventory: BTreeMap<(ProductId, Location), InventoryRecord>,
    transactions: Vec<InventoryTransaction>,
    requests: BTreeMap<InventoryRequestId, InventoryRequest>,
    sales: BTreeMap<SaleId, Sale>,
    sale_items: Vec<SaleItem>,
    returns: Vec<SaleReturn>,
    return_items: Vec<SaleReturnItem>,
}

/// In-memory transactional store.
///
/// Intended for tests/dev. Transactions are fully serialized: `begin` takes a
/// store-wide lock for the whole unit of work. The first write copies the
/// entire state, so a writing transaction costs O(state); the copy replaces
/// the shared state on commit. Read-only transactions never copy.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RetailStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        Ok(Box::new(InMemoryTx { guard, staged: None }))
    }
}

struct InMemoryTx {
    guard: OwnedMutexGuard<State>,
    staged: Option<State>,
}

impl InMemoryTx {
    fn state(&self) -> &State {
        self.staged.as_ref().unwrap_or(&*self.guard)
    }

    fn staged_mut(&mut self) -> &mut State {
        let committed: &State = &self.guard;
        self.staged.get_or_insert_with(|| State::clone(committed))
    }

    fn items_of(&self, sale_id: SaleId) -> impl Iterator<Item = &SaleItem> {
        self.state().sale_items.iter().filter(move |i| i.sale_id == sale_id)
    }
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn insert_category(&mut self, category: &Category) -> Result<(), StoreError> {
        self.staged_mut().categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn get_category(&mut self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        Ok(self.state().categories.get(&id).cloned())
    }

    async fn list_categories(&mut self) -> Result<Vec<Category>, StoreError> {
        let mut categories: Vec<Category> = self.state().categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        self.staged_mut().products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> Result<(), StoreError> {
        match self.staged_mut().products.get_mut(&product.id) {
            Some(existing) => {
                *existing = product.clone();
                Ok(())
            }
            None => Err(StoreError::Database(format!("product {} does not exist", product.id))),
        }
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.state().products.get(&id).cloned())
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.get_product(id).await
    }

    async fn list_products(&mut self) -> Result<Vec<Product>, StoreError> {
        let mut products: Vec<Product> = self.state().products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn lock_inventory(
        &mut self,
        product_id: ProductId,
        location: Location,
    ) -> Result<Option<InventoryRecord>, StoreError> {
        Ok(self.state().inventory.get(&(product_id, location)).cloned())
    }

    async fn upsert_inventory(&mut self, record: &InventoryRecord) -> Result<(), StoreError> {
        if record.quantity < 0 {
            return Err(StoreError::Database(format!(
                "inventory quantity for {}@{} cannot be negative",
                record.product_id, record.location
            )));
        }
        self.staged_mut().inventory.insert(record.key(), record.clone());
        Ok(())
    }

    async fn insert_inventory_transaction(
        &mut self,
        transaction: &InventoryTransaction,
    ) -> Result<(), StoreError> {
        self.staged_mut().transactions.push(transaction.clone());
        Ok(())
    }

    async fn list_inventory(
        &mut self,
        location: Option<Location>,
    ) -> Result<Vec<InventoryRecord>, StoreError> {
        Ok(self
            .state()
            .inventory
            .values()
            .filter(|r| location.is_none_or(|l| r.location == l))
            .cloned()
            .collect())
    }

    async fn list_inventory_transactions(
        &mut self,
        filter: &TransactionFilter,
        page: Pagination,
    ) -> Result<Vec<InventoryTransaction>, StoreError> {
        Ok(page.slice(
            self.state()
                .transactions
                .iter()
                .rev()
                .filter(|t| filter.matches(t))
                .cloned(),
        ))
    }

    async fn insert_inventory_request(&mut self, request: &InventoryRequest) -> Result<(), StoreError> {
        self.staged_mut().requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn lock_inventory_request(
        &mut self,
        id: InventoryRequestId,
    ) -> Result<Option<InventoryRequest>, StoreError> {
        Ok(self.state().requests.get(&id).cloned())
    }

    async fn update_inventory_request(&mut self, request: &InventoryRequest) -> Result<(), StoreError> {
        match self.staged_mut().requests.get_mut(&request.id) {
            Some(existing) => {
                *existing = request.clone();
                Ok(())
            }
            None => Err(StoreError::Database(format!(
                "inventory request {} does not exist",
                request.id
            ))),
        }
    }

    async fn list_inventory_requests(
        &mut self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<InventoryRequest>, StoreError> {
        Ok(self
            .state()
            .requests
            .values()
            .rev()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect())
    }

    async fn insert_sale(&mut self, sale: &Sale, items: &[SaleItem]) -> Result<(), StoreError> {
        if items.iter().any(|i| i.sale_id != sale.id) {
            return Err(StoreError::Database(format!(
                "sale items do not belong to sale {}",
                sale.id
            )));
        }
        self.staged_mut().sales.insert(sale.id, sale.clone());
        self.staged_mut().sale_items.extend(items.iter().cloned());
        Ok(())
    }

    async fn get_sale(&mut self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        Ok(self.state().sales.get(&id).cloned())
    }

    async fn lock_sale(&mut self, id: SaleId) -> Result<Option<Sale>, StoreError> {
        self.get_sale(id).await
    }

    async fn update_sale(&mut self, sale: &Sale) -> Result<(), StoreError> {
        match self.staged_mut().sales.get_mut(&sale.id) {
            Some(existing) => {
                *existing = sale.clone();
                Ok(())
            }
            None => Err(StoreError::Database(format!("sale {} does not exist", sale.id))),
        }
    }

    async fn sale_items(&mut self, sale_id: SaleId) -> Result<Vec<SaleItem>, StoreError> {
        Ok(self.items_of(sale_id).cloned().collect())
    }

    async fn list_sales(&mut self, filter: &SaleFilter, page: Pagination) -> Result<Vec<Sale>, StoreError> {
        let mut sales: Vec<&Sale> = self
            .state()
            .sales
            .values()
            .filter(|s| filter.matches(s))
            .collect();
        sales.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(page.slice(sales.into_iter().cloned()))
    }

    async fn insert_sale_return(
        &mut self,
        sale_return: &SaleReturn,
        items: &[SaleReturnItem],
    ) -> Result<(), StoreError> {
        self.staged_mut().returns.push(sale_return.clone());
        self.staged_mut().return_items.extend(items.iter().cloned());
        Ok(())
    }

    async fn sale_returns(&mut self, sale_id: SaleId) -> Result<Vec<SaleReturn>, StoreError> {
        Ok(self
            .state()
            .returns
            .iter()
            .filter(|r| r.sale_id == sale_id)
            .cloned()
            .collect())
    }

    async fn sale_return_items(&mut self, sale_id: SaleId) -> Result<Vec<SaleReturnItem>, StoreError> {
        let item_ids: Vec<_> = self.items_of(sale_id).map(|i| i.id).collect();
        Ok(self
            .state()
            .return_items
            .iter()
            .filter(|r| item_ids.contains(&r.sale_item_id))
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTx { mut guard, staged } = *self;
        if let Some(staged) = staged {
            *guard = staged;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(quantity: i64) -> InventoryRecord {
        InventoryRecord {
            product_id: ProductId::new(),
            location: Location::Utawala,
            quantity,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = InMemoryStore::new();
        let rec = record(4);

        let mut tx = store.begin().await.unwrap();
        tx.upsert_inventory(&rec).await.unwrap();
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.lock_inventory(rec.product_id, rec.location).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let store = InMemoryStore::new();
        let rec = record(4);

        let mut tx = store.begin().await.unwrap();
        tx.upsert_inventory(&rec).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let loaded = tx.lock_inventory(rec.product_id, rec.location).await.unwrap();
        assert_eq!(loaded, Some(rec));
    }

    #[tokio::test]
    async fn reads_see_staged_writes_before_commit() {
        let store = InMemoryStore::new();
        let rec = record(7);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.list_inventory(None).await.unwrap().is_empty());
        tx.upsert_inventory(&rec).await.unwrap();
        assert_eq!(tx.list_inventory(None).await.unwrap(), vec![rec.clone()]);
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.list_inventory(None).await.unwrap().is_empty());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn negative_quantities_are_refused() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        assert!(tx.upsert_inventory(&record(-1)).await.is_err());
    }
}
