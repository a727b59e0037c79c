use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use duka_core::{DomainError, Entity, InventoryRequestId, Location, ProductId, SaleId, UserId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl core::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(DomainError::validation(format!(
                "unknown request status '{other}'"
            ))),
        }
    }
}

/// A staff request for stock to be sold at a location.
///
/// Requests are fulfilled only by linking them to a sale at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRequest {
    pub id: InventoryRequestId,
    pub product_id: ProductId,
    pub location: Location,
    pub quantity: i64,
    pub requested_by: UserId,
    pub notes: Option<String>,
    pub status: RequestStatus,
    pub sale_id: Option<SaleId>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<UserId>,
}

impl Entity for InventoryRequest {
    type Id = InventoryRequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl InventoryRequest {
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    fn ensure_pending(&self) -> Result<(), DomainError> {
        if !self.is_pending() {
            return Err(DomainError::conflict(format!(
                "inventory request {} is already {}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    /// Mark the request approved and link it to the sale that fulfils it.
    pub fn fulfil(
        &mut self,
        sale_id: SaleId,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure_pending()?;
        self.status = RequestStatus::Approved;
        self.sale_id = Some(sale_id);
        self.resolved_at = Some(now);
        self.resolved_by = Some(actor);
        Ok(())
    }

    pub fn reject(&mut self, actor: UserId, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_pending()?;
        self.status = RequestStatus::Rejected;
        self.resolved_at = Some(now);
        self.resolved_by = Some(actor);
        Ok(())
    }
}

/// Command: CreateInventoryRequest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInventoryRequest {
    pub product_id: ProductId,
    pub location: Location,
    pub quantity: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewInventoryRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.quantity <= 0 {
            return Err(DomainError::validation("requested quantity must be positive"));
        }
        Ok(())
    }

    pub fn into_request(
        self,
        id: InventoryRequestId,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<InventoryRequest, DomainError> {
        self.validate()?;
        Ok(InventoryRequest {
            id,
            product_id: self.product_id,
            location: self.location,
            quantity: self.quantity,
            requested_by: actor,
            notes: self.notes.filter(|n| !n.trim().is_empty()),
            status: RequestStatus::Pending,
            sale_id: None,
            created_at: now,
            resolved_at: None,
            resolved_by: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> InventoryRequest {
        NewInventoryRequest {
            product_id: ProductId::new(),
            location: Location::Kamulu,
            quantity: 3,
            notes: Some("   ".into()),
        }
        .into_request(InventoryRequestId::new(), UserId::new(), Utc::now())
        .unwrap()
    }

    #[test]
    fn new_request_is_pending() {
        let req = pending();
        assert!(req.is_pending());
        assert_eq!(req.notes, None);
        assert_eq!(req.sale_id, None);
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let err = NewInventoryRequest {
            product_id: ProductId::new(),
            location: Location::Kamulu,
            quantity: 0,
            notes: None,
        }
        .into_request(InventoryRequestId::new(), UserId::new(), Utc::now())
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn fulfil_links_sale_once() {
        let mut req = pending();
        let sale = SaleId::new();
        req.fulfil(sale, UserId::new(), Utc::now()).unwrap();
        assert_eq!(req.status, RequestStatus::Approved);
        assert_eq!(req.sale_id, Some(sale));
        assert!(req.resolved_at.is_some());

        let err = req.fulfil(SaleId::new(), UserId::new(), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(req.sale_id, Some(sale));
    }

    #[test]
    fn rejected_request_cannot_be_fulfilled() {
        let mut req = pending();
        req.reject(UserId::new(), Utc::now()).unwrap();
        assert_eq!(req.status, RequestStatus::Rejected);
        assert!(req.fulfil(SaleId::new(), UserId::new(), Utc::now()).is_err());
    }

    #[test]
    fn status_parses_from_query_strings() {
        assert_eq!("Pending".parse::<RequestStatus>().unwrap(), RequestStatus::Pending);
        assert!("done".parse::<RequestStatus>().is_err());
    }
}
