use chrono::Utc;
use tracing::{info, instrument};

use duka_core::{DomainError, InventoryRequestId, InventoryTransactionId, Location, UserId};
use duka_inventory::{
    InventoryRecord, InventoryRequest, InventoryTransaction, NewInventoryRequest, PlannedTransfer,
    RequestStatus, StockAdjustment, StockTransfer,
};

use super::{EngineError, RetailEngine};
use crate::store::{Pagination, StoreTx, TransactionFilter};

impl RetailEngine {
    /// Apply a signed delta to one (product, location) counter.
    #[instrument(
        skip(self, cmd),
        fields(product_id = %cmd.product_id, location = %cmd.location, delta = cmd.delta),
        err
    )]
    pub async fn adjust_stock(&self, cmd: StockAdjustment) -> Result<InventoryRecord, EngineError> {
        cmd.validate()?;
        let cmd = &cmd;
        let record = self
            .run("adjust_stock", move || self.adjust_stock_once(cmd))
            .await?;
        info!(quantity = record.quantity, "stock adjusted");
        Ok(record)
    }

    async fn adjust_stock_once(&self, cmd: &StockAdjustment) -> Result<InventoryRecord, EngineError> {
        let mut tx = self.store.begin().await?;
        if tx.get_product(cmd.product_id).await?.is_none() {
            return Err(DomainError::not_found("product", cmd.product_id).into());
        }
        let record = apply_adjustment(tx.as_mut(), cmd).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Move stock between the two locations in one transaction.
    #[instrument(
        skip(self, cmd),
        fields(product_id = %cmd.product_id, from = %cmd.from, to = %cmd.to, quantity = cmd.quantity),
        err
    )]
    pub async fn transfer_stock(&self, cmd: StockTransfer) -> Result<PlannedTransfer, EngineError> {
        cmd.validate()?;
        let cmd = &cmd;
        let transfer = self
            .run("transfer_stock", move || self.transfer_stock_once(cmd))
            .await?;
        info!(
            source_quantity = transfer.source.quantity,
            destination_quantity = transfer.destination.quantity,
            "stock transferred"
        );
        Ok(transfer)
    }

    async fn transfer_stock_once(&self, cmd: &StockTransfer) -> Result<PlannedTransfer, EngineError> {
        let mut tx = self.store.begin().await?;
        if tx.get_product(cmd.product_id).await?.is_none() {
            return Err(DomainError::not_found("product", cmd.product_id).into());
        }

        let [first, second] = cmd.lock_order();
        let first_record = tx.lock_inventory(cmd.product_id, first).await?;
        let second_record = tx.lock_inventory(cmd.product_id, second).await?;
        let (source, destination) = if first == cmd.from {
            (first_record, second_record)
        } else {
            (second_record, first_record)
        };

        let planned = cmd.plan(
            source.as_ref(),
            destination.as_ref(),
            InventoryTransactionId::new(),
            Utc::now(),
        )?;
        tx.upsert_inventory(&planned.source).await?;
        tx.upsert_inventory(&planned.destination).await?;
        tx.insert_inventory_transaction(&planned.transaction).await?;
        tx.commit().await?;
        Ok(planned)
    }

    pub async fn list_inventory(&self, location: Option<Location>) -> Result<Vec<InventoryRecord>, EngineError> {
        self.run("list_inventory", move || async move {
            let mut tx = self.store.begin().await?;
            Ok::<_, EngineError>(tx.list_inventory(location).await?)
        })
        .await
    }

    pub async fn list_inventory_transactions(
        &self,
        filter: TransactionFilter,
        page: Pagination,
    ) -> Result<Vec<InventoryTransaction>, EngineError> {
        let filter = &filter;
        self.run("list_inventory_transactions", move || async move {
            let mut tx = self.store.begin().await?;
            Ok::<_, EngineError>(tx.list_inventory_transactions(filter, page).await?)
        })
        .await
    }

    #[instrument(skip(self, cmd), fields(product_id = %cmd.product_id, actor = %actor), err)]
    pub async fn create_inventory_request(
        &self,
        cmd: NewInventoryRequest,
        actor: UserId,
    ) -> Result<InventoryRequest, EngineError> {
        cmd.validate()?;
        let cmd = &cmd;
        let request = self
            .run("create_inventory_request", move || {
                self.create_inventory_request_once(cmd, actor)
            })
            .await?;
        info!(request_id = %request.id, "inventory request created");
        Ok(request)
    }

    async fn create_inventory_request_once(
        &self,
        cmd: &NewInventoryRequest,
        actor: UserId,
    ) -> Result<InventoryRequest, EngineError> {
        let mut tx = self.store.begin().await?;
        if tx.get_product(cmd.product_id).await?.is_none() {
            return Err(DomainError::not_found("product", cmd.product_id).into());
        }
        let request = cmd
            .clone()
            .into_request(InventoryRequestId::new(), actor, Utc::now())?;
        tx.insert_inventory_request(&request).await?;
        tx.commit().await?;
        Ok(request)
    }

    pub async fn list_inventory_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<InventoryRequest>, EngineError> {
        self.run("list_inventory_requests", move || async move {
            let mut tx = self.store.begin().await?;
            Ok::<_, EngineError>(tx.list_inventory_requests(status).await?)
        })
        .await
    }

    #[instrument(skip(self), fields(request_id = %id, actor = %actor), err)]
    pub async fn reject_inventory_request(
        &self,
        id: InventoryRequestId,
        actor: UserId,
    ) -> Result<InventoryRequest, EngineError> {
        let request = self
            .run("reject_inventory_request", move || async move {
                let mut tx = self.store.begin().await?;
                let mut request = tx
                    .lock_inventory_request(id)
                    .await?
                    .ok_or_else(|| DomainError::not_found("inventory request", id))?;
                request.reject(actor, Utc::now())?;
                tx.update_inventory_request(&request).await?;
                tx.commit().await?;
                Ok::<_, EngineError>(request)
            })
            .await?;
        info!("inventory request rejected");
        Ok(request)
    }
}

/// Lock the counter, plan the adjustment and write both the record and its
/// audit entry. Shared by every operation that moves stock at one location.
pub(super) async fn apply_adjustment(
    tx: &mut dyn StoreTx,
    cmd: &StockAdjustment,
) -> Result<InventoryRecord, EngineError> {
    let current = tx.lock_inventory(cmd.product_id, cmd.location).await?;
    let planned = cmd.plan(current.as_ref(), InventoryTransactionId::new(), Utc::now())?;
    tx.upsert_inventory(&planned.record).await?;
    tx.insert_inventory_transaction(&planned.transaction).await?;
    Ok(planned.record)
}
