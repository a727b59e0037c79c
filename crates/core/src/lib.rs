//! `duka-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by every Duka module
//! (identifiers, store locations, the domain error taxonomy). No infrastructure
//! concerns live here.

pub mod entity;
pub mod error;
pub mod id;
pub mod location;

pub use entity::Entity;
pub use error::{DomainError, Shortage};
pub use id::{
    CategoryId, InventoryRequestId, InventoryTransactionId, ProductId, SaleId, SaleItemId,
    SaleReturnId, SaleReturnItemId, UserId,
};
pub use location::Location;
