use std::str::FromStr;

use serde::Deserialize;

use duka_core::{DomainError, Location, ProductId, UserId};
use duka_infra::{Pagination, TransactionFilter};
use duka_inventory::{RequestStatus, StockAdjustment, StockTransfer, TransactionType};
use duka_sales::{SaleFilter, SaleStatus};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub product_id: ProductId,
    pub location: Location,
    pub delta: i64,
    pub notes: Option<String>,
    /// Ledger type override; inferred from the sign of `delta` when absent.
    pub transaction_type: Option<TransactionType>,
}

impl AdjustStockRequest {
    pub fn into_command(self, actor: UserId) -> StockAdjustment {
        let cmd = StockAdjustment::new(self.product_id, self.location, self.delta, actor)
            .with_notes(self.notes);
        match self.transaction_type {
            Some(t) => cmd.with_type(t),
            None => cmd,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TransferStockRequest {
    pub product_id: ProductId,
    pub from: Location,
    pub to: Location,
    pub quantity: i64,
    pub notes: Option<String>,
}

impl TransferStockRequest {
    pub fn into_command(self, actor: UserId) -> StockTransfer {
        StockTransfer {
            product_id: self.product_id,
            from: self.from,
            to: self.to,
            quantity: self.quantity,
            actor,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangeSaleStatusRequest {
    pub status: SaleStatus,
}

// -------------------------
// Query strings
// -------------------------
//
// Kept as raw strings so malformed values produce the JSON error envelope.

#[derive(Debug, Default, Deserialize)]
pub struct LocationQuery {
    pub location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionsQuery {
    pub product_id: Option<String>,
    pub location: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl TransactionsQuery {
    pub fn parse(&self) -> Result<(TransactionFilter, Pagination), axum::response::Response> {
        Ok((
            TransactionFilter {
                product_id: parse_opt(self.product_id.as_deref())?,
                location: parse_opt(self.location.as_deref())?,
            },
            Pagination::new(self.limit, self.offset),
        ))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RequestsQuery {
    pub status: Option<String>,
}

impl RequestsQuery {
    pub fn parse(&self) -> Result<Option<RequestStatus>, axum::response::Response> {
        parse_opt(self.status.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SalesQuery {
    pub status: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub include_fully_returned: bool,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl SalesQuery {
    pub fn parse(&self) -> Result<(SaleFilter, Pagination), axum::response::Response> {
        Ok((
            SaleFilter {
                status: parse_opt(self.status.as_deref())?,
                location: parse_opt(self.location.as_deref())?,
                include_fully_returned: self.include_fully_returned,
            },
            Pagination::new(self.limit, self.offset),
        ))
    }
}

// -------------------------
// Parsing helpers
// -------------------------

/// Parse a path/query value, mapping failures to a 400 response.
pub fn parse<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse().map_err(errors::domain_error_to_response)
}

pub fn parse_opt<T>(raw: Option<&str>) -> Result<Option<T>, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse(s).map(Some),
    }
}
