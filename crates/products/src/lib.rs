//! Product catalogue domain module.
//!
//! Products and categories with their validation rules, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod category;
pub mod product;

pub use category::{Category, NewCategory};
pub use product::{NewProduct, Product, ProductPatch};
