use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use duka_core::{
    DomainError, Entity, InventoryRequestId, Location, ProductId, SaleId, SaleItemId, UserId,
};

/// Sale status lifecycle.
///
/// `pending -> approved | rejected`, and `approved -> fully_returned` once
/// every item has been returned. `rejected` and `fully_returned` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Pending,
    Approved,
    Rejected,
    FullyReturned,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Approved => "approved",
            SaleStatus::Rejected => "rejected",
            SaleStatus::FullyReturned => "fully_returned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SaleStatus::Rejected | SaleStatus::FullyReturned)
    }
}

impl core::fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SaleStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(SaleStatus::Pending),
            "approved" => Ok(SaleStatus::Approved),
            "rejected" => Ok(SaleStatus::Rejected),
            "fully_returned" => Ok(SaleStatus::FullyReturned),
            other => Err(DomainError::validation(format!("unknown sale status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Mpesa,
    Cheque,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Mpesa => "mpesa",
            PaymentMethod::Cheque => "cheque",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "mpesa" => Ok(PaymentMethod::Mpesa),
            "cheque" => Ok(PaymentMethod::Cheque),
            other => Err(DomainError::validation(format!(
                "unknown payment method '{other}'"
            ))),
        }
    }
}

/// Sale header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    /// Store the sale draws stock from on approval.
    pub location: Location,
    /// Price in smallest currency unit (e.g., cents).
    pub total_amount: u64,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub status: SaleStatus,
    pub created_by: UserId,
    /// Actor who approved or rejected the sale.
    pub approved_by: Option<UserId>,
    pub fulfilling_request_id: Option<InventoryRequestId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Sale {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Sale {
    pub fn is_returnable(&self) -> bool {
        matches!(self.status, SaleStatus::Approved)
    }

    /// Validate a caller-requested status change without applying it.
    ///
    /// Only the pending decisions are reachable this way; `fully_returned` is
    /// entered through returns.
    pub fn ensure_transition(&self, target: SaleStatus) -> Result<(), DomainError> {
        match (self.status, target) {
            (SaleStatus::Pending, SaleStatus::Approved | SaleStatus::Rejected) => Ok(()),
            (from, to) => Err(DomainError::invariant(format!(
                "cannot transition sale {} from {from} to {to}",
                self.id
            ))),
        }
    }

    pub fn approve(&mut self, actor: UserId, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_transition(SaleStatus::Approved)?;
        self.status = SaleStatus::Approved;
        self.approved_by = Some(actor);
        self.updated_at = now;
        Ok(())
    }

    pub fn reject(&mut self, actor: UserId, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_transition(SaleStatus::Rejected)?;
        self.status = SaleStatus::Rejected;
        self.approved_by = Some(actor);
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_fully_returned(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != SaleStatus::Approved {
            return Err(DomainError::invariant(format!(
                "sale {} is {} and cannot become fully_returned",
                self.id, self.status
            )));
        }
        self.status = SaleStatus::FullyReturned;
        self.updated_at = now;
        Ok(())
    }
}

/// Sale line item. `quantity` is immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleItem {
    pub id: SaleItemId,
    pub sale_id: SaleId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: u64,
    pub total_price: u64,
}

impl Entity for SaleItem {
    type Id = SaleItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Price of `quantity` units, failing on non-positive quantities or overflow.
pub fn line_total(quantity: i64, unit_price: u64) -> Result<u64, DomainError> {
    let units = u64::try_from(quantity)
        .ok()
        .filter(|q| *q > 0)
        .ok_or_else(|| DomainError::validation("item quantity must be positive"))?;
    units
        .checked_mul(unit_price)
        .ok_or_else(|| DomainError::validation("line total overflows"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSaleItem {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: u64,
    /// Optional client-computed total; must match `quantity * unit_price`.
    #[serde(default)]
    pub total_price: Option<u64>,
}

/// Command: CreateSale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSale {
    pub customer_name: String,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    pub location: Location,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_reference: Option<String>,
    pub items: Vec<NewSaleItem>,
    #[serde(default)]
    pub fulfilling_request_id: Option<InventoryRequestId>,
}

impl NewSale {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.customer_name.trim().is_empty() {
            return Err(DomainError::validation("customer_name cannot be empty"));
        }
        if self.items.is_empty() {
            return Err(DomainError::validation("a sale needs at least one item"));
        }
        for (idx, item) in self.items.iter().enumerate() {
            let total = line_total(item.quantity, item.unit_price)
                .map_err(|e| DomainError::validation(format!("item {idx}: {e}")))?;
            if let Some(claimed) = item.total_price {
                if claimed != total {
                    return Err(DomainError::validation(format!(
                        "item {idx}: total_price {claimed} does not match quantity x unit_price ({total})"
                    )));
                }
            }
        }
        crate::approval::sum_by_product(self.items.iter().map(|i| (i.product_id, i.quantity)))?;
        Ok(())
    }

    /// Distinct products referenced by the items, for existence checks.
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = self.items.iter().map(|i| i.product_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Build the pending sale and its items with server-computed totals.
    pub fn into_sale(
        self,
        id: SaleId,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<(Sale, Vec<SaleItem>), DomainError> {
        self.validate()?;

        let mut total_amount: u64 = 0;
        let mut items = Vec::with_capacity(self.items.len());
        for item in &self.items {
            let total_price = line_total(item.quantity, item.unit_price)?;
            total_amount = total_amount
                .checked_add(total_price)
                .ok_or_else(|| DomainError::validation("sale total overflows"))?;
            items.push(SaleItem {
                id: SaleItemId::new(),
                sale_id: id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
                total_price,
            });
        }

        let sale = Sale {
            id,
            customer_name: self.customer_name.trim().to_string(),
            customer_phone: non_blank(self.customer_phone),
            customer_email: non_blank(self.customer_email),
            location: self.location,
            total_amount,
            payment_method: self.payment_method,
            payment_reference: non_blank(self.payment_reference),
            status: SaleStatus::Pending,
            created_by: actor,
            approved_by: None,
            fulfilling_request_id: self.fulfilling_request_id,
            created_at: now,
            updated_at: now,
        };
        Ok((sale, items))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Listing filter for sales.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleFilter {
    #[serde(default)]
    pub status: Option<SaleStatus>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub include_fully_returned: bool,
}

impl SaleFilter {
    pub fn matches(&self, sale: &Sale) -> bool {
        if let Some(status) = self.status {
            if sale.status != status {
                return false;
            }
        } else if sale.status == SaleStatus::FullyReturned && !self.include_fully_returned {
            return false;
        }
        self.location.is_none_or(|loc| sale.location == loc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_sale(items: Vec<(i64, u64)>) -> NewSale {
        NewSale {
            customer_name: "Wanjiku".into(),
            customer_phone: Some(" ".into()),
            customer_email: None,
            location: Location::Utawala,
            payment_method: PaymentMethod::Mpesa,
            payment_reference: Some("QX12".into()),
            items: items
                .into_iter()
                .map(|(quantity, unit_price)| NewSaleItem {
                    product_id: ProductId::new(),
                    quantity,
                    unit_price,
                    total_price: None,
                })
                .collect(),
            fulfilling_request_id: None,
        }
    }

    #[test]
    fn totals_are_computed_server_side() {
        let (sale, items) = new_sale(vec![(2, 100), (1, 50)])
            .into_sale(SaleId::new(), UserId::new(), Utc::now())
            .unwrap();

        assert_eq!(sale.total_amount, 250);
        assert_eq!(sale.status, SaleStatus::Pending);
        assert_eq!(sale.customer_phone, None);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].total_price, 200);
        assert!(items.iter().all(|i| i.sale_id == sale.id));
    }

    #[test]
    fn mismatched_client_total_is_rejected() {
        let mut cmd = new_sale(vec![(2, 100)]);
        cmd.items[0].total_price = Some(150);
        let err = cmd.into_sale(SaleId::new(), UserId::new(), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn empty_items_and_bad_quantities_are_rejected() {
        assert!(new_sale(vec![]).validate().is_err());
        assert!(new_sale(vec![(0, 10)]).validate().is_err());
        assert!(new_sale(vec![(-1, 10)]).validate().is_err());

        let mut cmd = new_sale(vec![(1, 10)]);
        cmd.customer_name = "  ".into();
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn overflowing_totals_are_rejected() {
        assert!(new_sale(vec![(2, u64::MAX)]).validate().is_err());
    }

    #[test]
    fn overflowing_quantity_of_one_product_is_rejected() {
        let mut cmd = new_sale(vec![(i64::MAX, 0), (i64::MAX, 0)]);
        cmd.items[1].product_id = cmd.items[0].product_id;
        let err = cmd.validate().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        cmd.items[1].product_id = ProductId::new();
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn pending_sale_can_be_approved_once() {
        let (mut sale, _) = new_sale(vec![(1, 10)])
            .into_sale(SaleId::new(), UserId::new(), Utc::now())
            .unwrap();
        let approver = UserId::new();
        sale.approve(approver, Utc::now()).unwrap();
        assert_eq!(sale.status, SaleStatus::Approved);
        assert_eq!(sale.approved_by, Some(approver));

        let err = sale.reject(UserId::new(), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(sale.approved_by, Some(approver));
    }

    #[test]
    fn fully_returned_is_not_a_manual_transition() {
        let (mut sale, _) = new_sale(vec![(1, 10)])
            .into_sale(SaleId::new(), UserId::new(), Utc::now())
            .unwrap();
        assert!(sale.ensure_transition(SaleStatus::FullyReturned).is_err());
        assert!(sale.mark_fully_returned(Utc::now()).is_err());

        sale.approve(UserId::new(), Utc::now()).unwrap();
        sale.mark_fully_returned(Utc::now()).unwrap();
        assert!(sale.status.is_terminal());
        assert!(sale.ensure_transition(SaleStatus::Approved).is_err());
    }

    #[test]
    fn default_filter_hides_fully_returned_sales() {
        let (mut sale, _) = new_sale(vec![(1, 10)])
            .into_sale(SaleId::new(), UserId::new(), Utc::now())
            .unwrap();
        sale.status = SaleStatus::FullyReturned;

        assert!(!SaleFilter::default().matches(&sale));
        assert!(
            SaleFilter {
                include_fully_returned: true,
                ..SaleFilter::default()
            }
            .matches(&sale)
        );
        assert!(
            SaleFilter {
                status: Some(SaleStatus::FullyReturned),
                ..SaleFilter::default()
            }
            .matches(&sale)
        );
        assert!(
            !SaleFilter {
                status: Some(SaleStatus::FullyReturned),
                location: Some(Location::Kamulu),
                ..SaleFilter::default()
            }
            .matches(&sale)
        );
    }

    #[test]
    fn statuses_use_snake_case_on_the_wire() {
        let json = serde_json::to_string(&SaleStatus::FullyReturned).unwrap();
        assert_eq!(json, "\"fully_returned\"");
        let method: PaymentMethod = serde_json::from_str("\"bank_transfer\"").unwrap();
        assert_eq!(method, PaymentMethod::BankTransfer);
    }
}
