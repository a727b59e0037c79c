use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use duka_core::{CategoryId, DomainError, Entity, ProductId};

/// A sellable product. Stock levels live in the inventory ledger, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    /// Quantity below which a location is considered low on this product.
    pub min_stock_level: i64,
    pub category_id: Option<CategoryId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Check whether `quantity` at some location is below the reorder threshold.
    pub fn is_low_stock(&self, quantity: i64) -> bool {
        quantity < self.min_stock_level
    }

    /// Apply a validated patch in place.
    pub fn apply_patch(&mut self, patch: ProductPatch, now: DateTime<Utc>) -> Result<(), DomainError> {
        patch.validate()?;

        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            self.description = normalize_description(description);
        }
        if let Some(min) = patch.min_stock_level {
            self.min_stock_level = min;
        }
        if let Some(category_id) = patch.category_id {
            self.category_id = category_id;
        }
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Command: create a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub min_stock_level: i64,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

impl NewProduct {
    pub fn into_product(self, id: ProductId, now: DateTime<Utc>) -> Result<Product, DomainError> {
        validate_name(&self.name)?;
        validate_min_stock(self.min_stock_level)?;

        Ok(Product {
            id,
            name: self.name.trim().to_string(),
            description: normalize_description(self.description),
            min_stock_level: self.min_stock_level,
            category_id: self.category_id,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update of a product.
///
/// Outer `None` leaves a field untouched. For nullable fields, `Some(None)`
/// (an explicit JSON `null`) clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub min_stock_level: Option<i64>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub category_id: Option<Option<CategoryId>>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.min_stock_level.is_none()
            && self.category_id.is_none()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.is_empty() {
            return Err(DomainError::validation("patch contains no fields"));
        }
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(min) = self.min_stock_level {
            validate_min_stock(min)?;
        }
        Ok(())
    }

    /// The category this patch points the product at, if it sets one.
    pub fn new_category(&self) -> Option<CategoryId> {
        self.category_id.flatten()
    }
}

fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn validate_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("product name cannot be empty"));
    }
    Ok(())
}

fn validate_min_stock(min: i64) -> Result<(), DomainError> {
    if min < 0 {
        return Err(DomainError::validation("min_stock_level cannot be negative"));
    }
    Ok(())
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}
