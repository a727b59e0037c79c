//! Domain error model.

use serde::Serialize;
use thiserror::Error;

use crate::id::{ProductId, SaleItemId};
use crate::location::Location;

/// A single product that cannot be covered by the stock at a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortage {
    pub product_id: ProductId,
    pub location: Location,
    pub requested: i64,
    pub available: i64,
}

impl core::fmt::Display for Shortage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "product {} at {}: requested {}, available {}",
            self.product_id, self.location, self.requested, self.available
        )
    }
}

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, quantity rules). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated (e.g. an illegal status transition).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A conflict occurred (e.g. a request that was already resolved).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stock adjustment would drive an inventory record below zero.
    #[error(
        "insufficient stock for product {product_id} at {location}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: ProductId,
        location: Location,
        available: i64,
        requested: i64,
    },

    /// One or more items of a sale cannot be covered by current inventory.
    #[error("insufficient inventory: {}", format_shortages(.0))]
    InsufficientInventory(Vec<Shortage>),

    /// A return asks for more than the item's remaining effective quantity.
    #[error(
        "over-return on sale item {sale_item_id}: requested {requested}, at most {remaining} can be returned"
    )]
    OverReturn {
        sale_item_id: SaleItemId,
        requested: i64,
        remaining: i64,
    },
}

fn format_shortages(shortages: &[Shortage]) -> String {
    shortages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_inventory_lists_every_product() {
        let a = ProductId::new();
        let b = ProductId::new();
        let err = DomainError::InsufficientInventory(vec![
            Shortage {
                product_id: a,
                location: Location::Utawala,
                requested: 10,
                available: 4,
            },
            Shortage {
                product_id: b,
                location: Location::Utawala,
                requested: 2,
                available: 0,
            },
        ]);

        let msg = err.to_string();
        assert!(msg.contains(&a.to_string()));
        assert!(msg.contains(&b.to_string()));
        assert!(msg.contains("requested 10, available 4"));
    }

    #[test]
    fn over_return_names_the_maximum() {
        let item = SaleItemId::new();
        let err = DomainError::OverReturn {
            sale_item_id: item,
            requested: 3,
            remaining: 2,
        };
        assert!(err.to_string().contains("at most 2"));
    }
}
