use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{info, instrument};

use duka_core::{DomainError, InventoryTransactionId, SaleId, UserId};
use duka_inventory::{StockAdjustment, TransactionType};
use duka_sales::{
    NewSale, Sale, SaleDetails, SaleFilter, SaleStatus, check_availability, project, stock_demand,
};

use super::{EngineError, RetailEngine};
use crate::store::{Pagination, StoreTx};

impl RetailEngine {
    /// Persist a pending sale with its items, optionally fulfilling a pending
    /// inventory request in the same transaction.
    #[instrument(
        skip(self, cmd),
        fields(location = %cmd.location, item_count = cmd.items.len(), actor = %actor),
        err
    )]
    pub async fn create_sale(&self, cmd: NewSale, actor: UserId) -> Result<SaleDetails, EngineError> {
        cmd.validate()?;
        let cmd = &cmd;
        let details = self
            .run("create_sale", move || self.create_sale_once(cmd, actor))
            .await?;
        info!(sale_id = %details.sale.id, total_amount = details.sale.total_amount, "sale created");
        Ok(details)
    }

    async fn create_sale_once(&self, cmd: &NewSale, actor: UserId) -> Result<SaleDetails, EngineError> {
        let mut tx = self.store.begin().await?;
        for product_id in cmd.product_ids() {
            if tx.get_product(product_id).await?.is_none() {
                return Err(DomainError::not_found("product", product_id).into());
            }
        }

        let now = Utc::now();
        let (sale, items) = cmd.clone().into_sale(SaleId::new(), actor, now)?;

        let request = match cmd.fulfilling_request_id {
            Some(request_id) => {
                let mut request = tx
                    .lock_inventory_request(request_id)
                    .await?
                    .ok_or_else(|| DomainError::not_found("inventory request", request_id))?;
                request.fulfil(sale.id, actor, now)?;
                Some(request)
            }
            None => None,
        };

        tx.insert_sale(&sale, &items).await?;
        if let Some(request) = &request {
            tx.update_inventory_request(request).await?;
        }
        tx.commit().await?;

        Ok(SaleDetails {
            items: project(&items, &[]),
            sale,
        })
    }

    /// Sale header plus items with effective quantities.
    pub async fn get_sale(&self, id: SaleId) -> Result<SaleDetails, EngineError> {
        self.run("get_sale", move || async move {
            let mut tx = self.store.begin().await?;
            let sale = tx
                .get_sale(id)
                .await?
                .ok_or_else(|| DomainError::not_found("sale", id))?;
            load_details(tx.as_mut(), sale).await
        })
        .await
    }

    pub async fn list_sales(&self, filter: SaleFilter, page: Pagination) -> Result<Vec<Sale>, EngineError> {
        let filter = &filter;
        self.run("list_sales", move || async move {
            let mut tx = self.store.begin().await?;
            Ok::<_, EngineError>(tx.list_sales(filter, page).await?)
        })
        .await
    }

    /// Approve or reject a pending sale.
    ///
    /// Approval deducts every product's summed quantity from the sale's
    /// location; if any product is short nothing changes.
    #[instrument(skip(self), fields(sale_id = %id, target = %target, actor = %actor), err)]
    pub async fn change_sale_status(
        &self,
        id: SaleId,
        target: SaleStatus,
        actor: UserId,
    ) -> Result<SaleDetails, EngineError> {
        let details = self
            .run("change_sale_status", move || {
                self.change_sale_status_once(id, target, actor)
            })
            .await?;
        info!(status = %details.sale.status, "sale status changed");
        Ok(details)
    }

    async fn change_sale_status_once(
        &self,
        id: SaleId,
        target: SaleStatus,
        actor: UserId,
    ) -> Result<SaleDetails, EngineError> {
        let mut tx = self.store.begin().await?;
        let mut sale = tx
            .lock_sale(id)
            .await?
            .ok_or_else(|| DomainError::not_found("sale", id))?;
        sale.ensure_transition(target)?;

        let now = Utc::now();
        match target {
            SaleStatus::Approved => {
                approve_stock(tx.as_mut(), &sale, actor).await?;
                sale.approve(actor, now)?;
            }
            SaleStatus::Rejected => sale.reject(actor, now)?,
            other => {
                return Err(DomainError::invariant(format!(
                    "sale {id} cannot be moved to {other} directly"
                ))
                .into());
            }
        }

        tx.update_sale(&sale).await?;
        let details = load_details(tx.as_mut(), sale).await?;
        tx.commit().await?;
        Ok(details)
    }
}

/// Lock the sale location's counters in product order, check every product,
/// then deduct.
async fn approve_stock(tx: &mut dyn StoreTx, sale: &Sale, actor: UserId) -> Result<(), EngineError> {
    let items = tx.sale_items(sale.id).await?;
    let demand = stock_demand(&items)?;

    let mut locked = BTreeMap::new();
    for d in &demand {
        let record = tx.lock_inventory(d.product_id, sale.location).await?;
        locked.insert(d.product_id, record);
    }

    check_availability(sale.location, &demand, |product_id| {
        locked
            .get(&product_id)
            .and_then(|r| r.as_ref())
            .map(|r| r.quantity)
            .unwrap_or(0)
    })?;

    let now = Utc::now();
    for d in &demand {
        let current = locked.get(&d.product_id).and_then(|r| r.as_ref());
        let planned = StockAdjustment::new(d.product_id, sale.location, -d.quantity, actor)
            .with_type(TransactionType::Sale)
            .with_notes(Some(format!("sale {}", sale.id)))
            .plan(current, InventoryTransactionId::new(), now)?;
        tx.upsert_inventory(&planned.record).await?;
        tx.insert_inventory_transaction(&planned.transaction).await?;
    }
    Ok(())
}

pub(super) async fn load_details(tx: &mut dyn StoreTx, sale: Sale) -> Result<SaleDetails, EngineError> {
    let items = tx.sale_items(sale.id).await?;
    let returned = tx.sale_return_items(sale.id).await?;
    Ok(SaleDetails {
        items: project(&items, &returned),
        sale,
    })
}
