//! Effective-quantity projection.
//!
//! `effective_quantity = quantity - sum(quantity_returned)` per sale item,
//! computed from persisted return rows at read time. Nothing is cached, so two
//! reads with no return in between always agree.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use duka_core::{ProductId, SaleItemId};

use crate::returns::SaleReturnItem;
use crate::sale::{Sale, SaleItem};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveLine {
    pub sale_item_id: SaleItemId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub returned_quantity: i64,
    pub effective_quantity: i64,
    pub unit_price: u64,
}

/// Sale header plus its items with effective quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleDetails {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<EffectiveLine>,
}

/// Project each item of a sale against all of its accepted return items.
///
/// Return items that reference other sales' items are ignored. Output keeps
/// the order of `items`.
pub fn project(items: &[SaleItem], returned: &[SaleReturnItem]) -> Vec<EffectiveLine> {
    let mut returned_by_item: HashMap<SaleItemId, i64> = HashMap::new();
    for r in returned {
        *returned_by_item.entry(r.sale_item_id).or_insert(0) += r.quantity_returned;
    }

    items
        .iter()
        .map(|item| {
            let returned_quantity = returned_by_item.get(&item.id).copied().unwrap_or(0);
            EffectiveLine {
                sale_item_id: item.id,
                product_id: item.product_id,
                quantity: item.quantity,
                returned_quantity,
                effective_quantity: item.quantity - returned_quantity,
                unit_price: item.unit_price,
            }
        })
        .collect()
}

/// True when there is at least one line and nothing is left to return.
pub fn is_fully_returned(lines: &[EffectiveLine]) -> bool {
    !lines.is_empty() && lines.iter().all(|l| l.effective_quantity == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use duka_core::{SaleId, SaleReturnId, SaleReturnItemId};

    fn item(quantity: i64) -> SaleItem {
        SaleItem {
            id: SaleItemId::new(),
            sale_id: SaleId::new(),
            product_id: ProductId::new(),
            quantity,
            unit_price: 100,
            total_price: 100 * quantity as u64,
        }
    }

    fn returned(item: &SaleItem, quantity: i64) -> SaleReturnItem {
        SaleReturnItem {
            id: SaleReturnItemId::new(),
            sale_return_id: SaleReturnId::new(),
            sale_item_id: item.id,
            quantity_returned: quantity,
            unit_price: item.unit_price,
            total_price: item.unit_price * quantity as u64,
        }
    }

    #[test]
    fn sums_returns_across_multiple_returns() {
        let a = item(5);
        let b = item(2);
        let lines = project(
            &[a.clone(), b.clone()],
            &[returned(&a, 2), returned(&a, 1), returned(&item(9), 9)],
        );

        assert_eq!(lines[0].returned_quantity, 3);
        assert_eq!(lines[0].effective_quantity, 2);
        assert_eq!(lines[1].returned_quantity, 0);
        assert_eq!(lines[1].effective_quantity, 2);
        assert!(!is_fully_returned(&lines));
    }

    #[test]
    fn projection_is_idempotent() {
        let a = item(4);
        let rows = vec![returned(&a, 1)];
        let items = vec![a];
        assert_eq!(project(&items, &rows), project(&items, &rows));
    }

    #[test]
    fn fully_returned_requires_every_line_at_zero() {
        let a = item(1);
        let b = item(2);
        let lines = project(&[a.clone(), b.clone()], &[returned(&a, 1), returned(&b, 2)]);
        assert!(is_fully_returned(&lines));
        assert!(!is_fully_returned(&[]));
    }
}
