use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use duka_core::{CategoryId, DomainError, Entity};

/// Product category (flat, name-only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Command: create a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
}

impl NewCategory {
    pub fn into_category(self, id: CategoryId, now: DateTime<Utc>) -> Result<Category, DomainError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("category name cannot be empty"));
        }
        Ok(Category {
            id,
            name: name.to_string(),
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_name() {
        let c = NewCategory { name: "  Paints ".into() }
            .into_category(CategoryId::new(), Utc::now())
            .unwrap();
        assert_eq!(c.name, "Paints");
    }

    #[test]
    fn rejects_blank_name() {
        let err = NewCategory { name: "   ".into() }
            .into_category(CategoryId::new(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
