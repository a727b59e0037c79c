use axum::{routing::get, Router};

pub mod categories;
pub mod common;
pub mod inventory;
pub mod products;
pub mod sales;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/categories", categories::router())
        .nest("/products", products::router())
        .nest("/inventory", inventory::router())
        .nest("/sales", sales::router())
}
