use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use duka_core::entity::index_by_id;
use duka_core::{
    DomainError, Entity, ProductId, SaleId, SaleItemId, SaleReturnId, SaleReturnItemId, UserId,
};

use crate::approval::StockDemand;
use crate::effective::{is_fully_returned, project};
use crate::sale::{Sale, SaleItem, line_total};

/// Return header. One sale may have many returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleReturn {
    pub id: SaleReturnId,
    pub sale_id: SaleId,
    pub created_by: UserId,
    pub notes: Option<String>,
    pub total_refund_amount: u64,
    pub created_at: DateTime<Utc>,
}

impl Entity for SaleReturn {
    type Id = SaleReturnId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// One returned line. `unit_price` is copied from the sale item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleReturnItem {
    pub id: SaleReturnItemId,
    pub sale_return_id: SaleReturnId,
    pub sale_item_id: SaleItemId,
    pub quantity_returned: i64,
    pub unit_price: u64,
    pub total_price: u64,
}

impl Entity for SaleReturnItem {
    type Id = SaleReturnItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleReturnDetails {
    #[serde(flatten)]
    pub sale_return: SaleReturn,
    pub items: Vec<SaleReturnItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLine {
    pub sale_item_id: SaleItemId,
    pub quantity_returned: i64,
    /// Checked against the sale item's price when supplied.
    #[serde(default)]
    pub unit_price: Option<u64>,
}

/// Command: ProcessReturn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub items: Vec<ReturnLine>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ReturnRequest {
    /// Shape checks that need no stored state.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.items.is_empty() {
            return Err(DomainError::validation("a return needs at least one item"));
        }
        let mut seen = HashSet::with_capacity(self.items.len());
        for line in &self.items {
            if line.quantity_returned <= 0 {
                return Err(DomainError::validation(format!(
                    "sale item {}: quantity_returned must be positive",
                    line.sale_item_id
                )));
            }
            if !seen.insert(line.sale_item_id) {
                return Err(DomainError::validation(format!(
                    "sale item {} appears more than once in the return",
                    line.sale_item_id
                )));
            }
        }
        Ok(())
    }
}

/// Rows to persist for an accepted return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedReturn {
    pub sale_return: SaleReturn,
    pub items: Vec<SaleReturnItem>,
    /// Every item reaches zero effective quantity once these rows land.
    pub completes_sale: bool,
    /// Units returned per product, for restocking.
    pub restock: Vec<StockDemand>,
}

/// Validate a return against the sale's items and every return already
/// persisted for it, and build the rows to insert.
///
/// Callers must hold the sale lock while reading `prior` and writing the plan,
/// otherwise two concurrent returns can both pass the remaining check.
pub fn plan_return(
    sale: &Sale,
    sale_items: &[SaleItem],
    prior: &[SaleReturnItem],
    request: &ReturnRequest,
    actor: UserId,
    now: DateTime<Utc>,
) -> Result<PlannedReturn, DomainError> {
    request.validate()?;
    if !sale.is_returnable() {
        return Err(DomainError::invariant(format!(
            "sale {} is {}; only approved sales accept returns",
            sale.id, sale.status
        )));
    }

    let by_id = index_by_id(sale_items);
    let mut remaining: BTreeMap<SaleItemId, i64> = project(sale_items, prior)
        .into_iter()
        .map(|l| (l.sale_item_id, l.effective_quantity))
        .collect();

    let return_id = SaleReturnId::new();
    let mut items = Vec::with_capacity(request.items.len());
    let mut total_refund_amount: u64 = 0;
    let mut restock: BTreeMap<ProductId, i64> = BTreeMap::new();

    for line in &request.items {
        let sale_item = by_id.get(&line.sale_item_id).ok_or_else(|| {
            DomainError::validation(format!(
                "sale item {} does not belong to sale {}",
                line.sale_item_id, sale.id
            ))
        })?;

        if let Some(price) = line.unit_price {
            if price != sale_item.unit_price {
                return Err(DomainError::validation(format!(
                    "sale item {}: unit_price {price} does not match the sold price {}",
                    line.sale_item_id, sale_item.unit_price
                )));
            }
        }

        let left = remaining.get(&line.sale_item_id).copied().unwrap_or(0);
        if line.quantity_returned > left {
            return Err(DomainError::OverReturn {
                sale_item_id: line.sale_item_id,
                requested: line.quantity_returned,
                remaining: left,
            });
        }
        remaining.insert(line.sale_item_id, left - line.quantity_returned);

        let total_price = line_total(line.quantity_returned, sale_item.unit_price)?;
        total_refund_amount = total_refund_amount
            .checked_add(total_price)
            .ok_or_else(|| DomainError::validation("refund total overflows"))?;
        let units = restock.entry(sale_item.product_id).or_insert(0);
        *units = units
            .checked_add(line.quantity_returned)
            .ok_or_else(|| DomainError::validation("returned quantity overflows"))?;

        items.push(SaleReturnItem {
            id: SaleReturnItemId::new(),
            sale_return_id: return_id,
            sale_item_id: line.sale_item_id,
            quantity_returned: line.quantity_returned,
            unit_price: sale_item.unit_price,
            total_price,
        });
    }

    let mut after = prior.to_vec();
    after.extend(items.iter().cloned());
    let completes_sale = is_fully_returned(&project(sale_items, &after));

    Ok(PlannedReturn {
        sale_return: SaleReturn {
            id: return_id,
            sale_id: sale.id,
            created_by: actor,
            notes: request
                .notes
                .as_ref()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            total_refund_amount,
            created_at: now,
        },
        items,
        completes_sale,
        restock: restock
            .into_iter()
            .map(|(product_id, quantity)| StockDemand {
                product_id,
                quantity,
            })
            .collect(),
    })
}
