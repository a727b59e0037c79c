//! Infrastructure layer: transactional stores, the retail engine, config.
//!
//! Domain crates decide; this crate runs each decision inside one store
//! transaction (lock, plan, write, commit) with a timeout and bounded retry.

pub mod config;
pub mod engine;
pub mod retry;
pub mod store;

pub use config::{ConfigError, EngineConfig};
pub use engine::{EngineError, ProductStock, ReturnReceipt, RetailEngine};
pub use store::{InMemoryStore, Pagination, PostgresStore, RetailStore, StoreError, StoreTx, TransactionFilter};
