use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use duka_core::{CategoryId, DomainError, Location, ProductId};
use duka_products::{Category, NewCategory, NewProduct, Product, ProductPatch};

use super::{EngineError, RetailEngine};
use crate::store::StoreTx;

/// A product with its stock at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStock {
    #[serde(flatten)]
    pub product: Product,
    pub location: Location,
    pub quantity: i64,
    pub low_stock: bool,
}

impl RetailEngine {
    #[instrument(skip(self, cmd), err)]
    pub async fn create_category(&self, cmd: NewCategory) -> Result<Category, EngineError> {
        let cmd = &cmd;
        let category = self
            .run("create_category", move || self.create_category_once(cmd))
            .await?;
        info!(category_id = %category.id, "category created");
        Ok(category)
    }

    async fn create_category_once(&self, cmd: &NewCategory) -> Result<Category, EngineError> {
        let mut tx = self.store.begin().await?;
        let category = cmd.clone().into_category(CategoryId::new(), Utc::now())?;
        tx.insert_category(&category).await?;
        tx.commit().await?;
        Ok(category)
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, EngineError> {
        self.run("list_categories", move || async move {
            let mut tx = self.store.begin().await?;
            Ok::<_, EngineError>(tx.list_categories().await?)
        })
        .await
    }

    #[instrument(skip(self, cmd), err)]
    pub async fn create_product(&self, cmd: NewProduct) -> Result<Product, EngineError> {
        let cmd = &cmd;
        let product = self
            .run("create_product", move || self.create_product_once(cmd))
            .await?;
        info!(product_id = %product.id, "product created");
        Ok(product)
    }

    async fn create_product_once(&self, cmd: &NewProduct) -> Result<Product, EngineError> {
        let mut tx = self.store.begin().await?;
        let product = cmd.clone().into_product(ProductId::new(), Utc::now())?;
        ensure_category(tx.as_mut(), product.category_id).await?;
        tx.insert_product(&product).await?;
        tx.commit().await?;
        Ok(product)
    }

    #[instrument(skip(self, patch), fields(product_id = %id), err)]
    pub async fn update_product(&self, id: ProductId, patch: ProductPatch) -> Result<Product, EngineError> {
        patch.validate()?;
        let patch = &patch;
        self.run("update_product", move || self.update_product_once(id, patch))
            .await
    }

    async fn update_product_once(&self, id: ProductId, patch: &ProductPatch) -> Result<Product, EngineError> {
        let mut tx = self.store.begin().await?;
        let mut product = tx
            .lock_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("product", id))?;
        ensure_category(tx.as_mut(), patch.new_category()).await?;
        product.apply_patch(patch.clone(), Utc::now())?;
        tx.update_product(&product).await?;
        tx.commit().await?;
        Ok(product)
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product, EngineError> {
        self.run("get_product", move || async move {
            let mut tx = self.store.begin().await?;
            let product = tx
                .get_product(id)
                .await?
                .ok_or_else(|| DomainError::not_found("product", id))?;
            Ok::<_, EngineError>(product)
        })
        .await
    }

    /// Every product with its quantity at `location` (0 without a ledger record).
    pub async fn list_products_by_location(&self, location: Location) -> Result<Vec<ProductStock>, EngineError> {
        self.run("list_products_by_location", move || async move {
            let mut tx = self.store.begin().await?;
            let products = tx.list_products().await?;
            let stock: HashMap<ProductId, i64> = tx
                .list_inventory(Some(location))
                .await?
                .into_iter()
                .map(|r| (r.product_id, r.quantity))
                .collect();

            Ok::<_, EngineError>(products
                .into_iter()
                .map(|product| {
                    let quantity = stock.get(&product.id).copied().unwrap_or(0);
                    ProductStock {
                        low_stock: product.is_low_stock(quantity),
                        product,
                        location,
                        quantity,
                    }
                })
                .collect::<Vec<_>>())
        })
        .await
    }
}

/// Fail with `NotFound` when a referenced category does not exist.
async fn ensure_category(tx: &mut dyn StoreTx, category_id: Option<CategoryId>) -> Result<(), EngineError> {
    if let Some(id) = category_id {
        if tx.get_category(id).await?.is_none() {
            return Err(DomainError::not_found("category", id).into());
        }
    }
    Ok(())
}
