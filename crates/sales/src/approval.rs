use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use duka_core::{DomainError, Location, ProductId, Shortage};

use crate::sale::SaleItem;

/// Total units a sale needs of one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDemand {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Sum item quantities per product, ordered by product id.
///
/// The ordering doubles as the inventory lock order on approval.
pub fn stock_demand(items: &[SaleItem]) -> Result<Vec<StockDemand>, DomainError> {
    sum_by_product(items.iter().map(|i| (i.product_id, i.quantity)))
}

pub(crate) fn sum_by_product<I>(lines: I) -> Result<Vec<StockDemand>, DomainError>
where
    I: IntoIterator<Item = (ProductId, i64)>,
{
    let mut totals: BTreeMap<ProductId, i64> = BTreeMap::new();
    for (product_id, quantity) in lines {
        let total = totals.entry(product_id).or_insert(0);
        *total = total.checked_add(quantity).ok_or_else(|| {
            DomainError::validation(format!("quantity of product {product_id} overflows"))
        })?;
    }
    Ok(totals
        .into_iter()
        .map(|(product_id, quantity)| StockDemand {
            product_id,
            quantity,
        })
        .collect())
}

/// Check every demand against the locked stock at `location`.
///
/// `available` returns the current quantity for a product (0 when the ledger
/// has no record). All short products are reported together.
pub fn check_availability<F>(
    location: Location,
    demand: &[StockDemand],
    available: F,
) -> Result<(), DomainError>
where
    F: Fn(ProductId) -> i64,
{
    let shortages: Vec<Shortage> = demand
        .iter()
        .filter_map(|d| {
            let on_hand = available(d.product_id);
            (on_hand < d.quantity).then_some(Shortage {
                product_id: d.product_id,
                location,
                requested: d.quantity,
                available: on_hand,
            })
        })
        .collect();

    if shortages.is_empty() {
        Ok(())
    } else {
        Err(DomainError::InsufficientInventory(shortages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duka_core::{SaleId, SaleItemId};

    fn item(sale_id: SaleId, product_id: ProductId, quantity: i64) -> SaleItem {
        SaleItem {
            id: SaleItemId::new(),
            sale_id,
            product_id,
            quantity,
            unit_price: 10,
            total_price: 10 * quantity as u64,
        }
    }

    #[test]
    fn lines_sharing_a_product_are_summed() {
        let sale = SaleId::new();
        let a = ProductId::new();
        let b = ProductId::new();
        let demand = stock_demand(&[item(sale, a, 2), item(sale, b, 1), item(sale, a, 3)]).unwrap();

        assert_eq!(demand.len(), 2);
        let for_a = demand.iter().find(|d| d.product_id == a).unwrap();
        assert_eq!(for_a.quantity, 5);
        assert!(demand.windows(2).all(|w| w[0].product_id < w[1].product_id));
    }

    #[test]
    fn summed_quantity_overflow_is_a_validation_error() {
        let sale = SaleId::new();
        let a = ProductId::new();
        let mut big = item(sale, a, 1);
        big.quantity = i64::MAX;

        let err = stock_demand(&[big.clone(), big]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn every_short_product_is_reported() {
        let a = ProductId::new();
        let b = ProductId::new();
        let c = ProductId::new();
        let demand = vec![
            StockDemand { product_id: a, quantity: 10 },
            StockDemand { product_id: b, quantity: 1 },
            StockDemand { product_id: c, quantity: 2 },
        ];
        let stock = BTreeMap::from([(a, 4), (b, 1)]);

        let err = check_availability(Location::Kamulu, &demand, |p| {
            stock.get(&p).copied().unwrap_or(0)
        })
        .unwrap_err();

        match err {
            DomainError::InsufficientInventory(shortages) => {
                assert_eq!(shortages.len(), 2);
                assert_eq!(shortages[0].product_id, a);
                assert_eq!(shortages[0].requested, 10);
                assert_eq!(shortages[0].available, 4);
                assert_eq!(shortages[1].product_id, c);
                assert_eq!(shortages[1].available, 0);
                assert!(shortages.iter().all(|s| s.location == Location::Kamulu));
            }
            other => panic!("expected InsufficientInventory, got {other:?}"),
        }
    }

    #[test]
    fn exact_stock_is_enough() {
        let a = ProductId::new();
        let demand = vec![StockDemand { product_id: a, quantity: 4 }];
        assert!(check_availability(Location::Utawala, &demand, |_| 4).is_ok());
    }
}
