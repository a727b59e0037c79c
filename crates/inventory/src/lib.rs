//! Inventory ledger domain module.
//!
//! Per-(product, location) stock counters that change only through signed
//! adjustments, each producing an immutable audit transaction, plus staff
//! inventory requests. Pure deterministic domain logic (no IO, no storage):
//! callers load the current record under a lock, ask this crate for a plan,
//! and persist the plan atomically.

pub mod ledger;
pub mod request;

pub use ledger::{
    InventoryRecord, InventoryTransaction, PlannedAdjustment, PlannedTransfer, StockAdjustment,
    StockTransfer, TransactionType,
};
pub use request::{InventoryRequest, NewInventoryRequest, RequestStatus};
