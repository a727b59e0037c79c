use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use duka_core::{DomainError, SaleId, SaleReturnId, UserId};
use duka_inventory::{StockAdjustment, TransactionType};
use duka_sales::{ReturnRequest, SaleReturnDetails, SaleReturnItem, SaleStatus, plan_return};

use super::inventory::apply_adjustment;
use super::{EngineError, RetailEngine};

/// An accepted return and the sale status it left behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnReceipt {
    #[serde(rename = "return")]
    pub sale_return: SaleReturnDetails,
    pub sale_status: SaleStatus,
}

impl RetailEngine {
    /// Record a return against an approved sale.
    ///
    /// The sale row lock serializes concurrent returns, so the remaining
    /// quantity check always sees every previously committed return.
    #[instrument(
        skip(self, request),
        fields(sale_id = %sale_id, item_count = request.items.len(), actor = %actor),
        err
    )]
    pub async fn process_return(
        &self,
        sale_id: SaleId,
        request: ReturnRequest,
        actor: UserId,
    ) -> Result<ReturnReceipt, EngineError> {
        request.validate()?;
        let request = &request;
        let receipt = self
            .run("process_return", move || {
                self.process_return_once(sale_id, request, actor)
            })
            .await?;
        info!(
            return_id = %receipt.sale_return.sale_return.id,
            refund = receipt.sale_return.sale_return.total_refund_amount,
            sale_status = %receipt.sale_status,
            "return processed"
        );
        Ok(receipt)
    }

    async fn process_return_once(
        &self,
        sale_id: SaleId,
        request: &ReturnRequest,
        actor: UserId,
    ) -> Result<ReturnReceipt, EngineError> {
        let mut tx = self.store.begin().await?;
        let mut sale = tx
            .lock_sale(sale_id)
            .await?
            .ok_or_else(|| DomainError::not_found("sale", sale_id))?;
        let items = tx.sale_items(sale_id).await?;
        let prior = tx.sale_return_items(sale_id).await?;

        let now = Utc::now();
        let planned = plan_return(&sale, &items, &prior, request, actor, now)?;
        tx.insert_sale_return(&planned.sale_return, &planned.items).await?;

        if self.config.restock_on_return {
            for d in &planned.restock {
                let cmd = StockAdjustment::new(d.product_id, sale.location, d.quantity, actor)
                    .with_type(TransactionType::Adjustment)
                    .with_notes(Some(format!("return {}", planned.sale_return.id)));
                apply_adjustment(tx.as_mut(), &cmd).await?;
            }
        }

        if planned.completes_sale {
            sale.mark_fully_returned(now)?;
            tx.update_sale(&sale).await?;
        }
        tx.commit().await?;

        Ok(ReturnReceipt {
            sale_return: SaleReturnDetails {
                sale_return: planned.sale_return,
                items: planned.items,
            },
            sale_status: sale.status,
        })
    }

    /// All returns of a sale with their items, oldest first.
    pub async fn list_returns(&self, sale_id: SaleId) -> Result<Vec<SaleReturnDetails>, EngineError> {
        self.run("list_returns", move || async move {
            let mut tx = self.store.begin().await?;
            if tx.get_sale(sale_id).await?.is_none() {
                return Err(DomainError::not_found("sale", sale_id).into());
            }
            let returns = tx.sale_returns(sale_id).await?;
            let mut items_by_return: HashMap<SaleReturnId, Vec<SaleReturnItem>> = HashMap::new();
            for item in tx.sale_return_items(sale_id).await? {
                items_by_return.entry(item.sale_return_id).or_default().push(item);
            }

            Ok::<_, EngineError>(
                returns
                    .into_iter()
                    .map(|sale_return| SaleReturnDetails {
                        items: items_by_return.remove(&sale_return.id).unwrap_or_default(),
                        sale_return,
                    })
                    .collect::<Vec<_>>(),
            )
        })
        .await
    }
}
