//! Sales domain module.
//!
//! Sale headers and line items, the status lifecycle, approval stock checks,
//! return planning and the effective-quantity projection. Pure deterministic
//! domain logic (no IO, no HTTP, no storage).

pub mod approval;
pub mod effective;
pub mod returns;
pub mod sale;

pub use approval::{StockDemand, check_availability, stock_demand};
pub use effective::{EffectiveLine, SaleDetails, is_fully_returned, project};
pub use returns::{
    PlannedReturn, ReturnLine, ReturnRequest, SaleReturn, SaleReturnDetails, SaleReturnItem,
    plan_return,
};
pub use sale::{
    NewSale, NewSaleItem, PaymentMethod, Sale, SaleFilter, SaleItem, SaleStatus,
};
