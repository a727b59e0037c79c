use std::sync::Arc;

use thiserror::Error;

use duka_infra::{EngineConfig, InMemoryStore, PostgresStore, RetailEngine, RetailStore, StoreError};

use crate::config::ApiConfig;

#[derive(Debug, Error)]
pub enum ServicesError {
    #[error("store initialisation failed: {0}")]
    Store(#[from] StoreError),
}

/// Everything the handlers need, shared behind an `Arc` extension.
#[derive(Clone)]
pub struct AppServices {
    pub engine: RetailEngine,
}

impl AppServices {
    pub fn new(engine: RetailEngine) -> Self {
        Self { engine }
    }

    /// Engine over a fresh in-memory store (dev/test).
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(RetailEngine::new(Arc::new(InMemoryStore::new()), config))
    }
}

/// Postgres when `DATABASE_URL` is set (schema applied on start), otherwise
/// the in-memory store.
pub async fn build_services(config: &ApiConfig) -> Result<AppServices, ServicesError> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; using the in-memory store");
        return Ok(AppServices::in_memory(config.engine.clone()));
    };

    let store = PostgresStore::connect(
        url,
        config.database_max_connections,
        config.engine.lock_timeout,
    )
    .await?;
    store.migrate().await?;
    tracing::info!(
        max_connections = config.database_max_connections,
        "connected to postgres"
    );

    let store: Arc<dyn RetailStore> = Arc::new(store);
    Ok(AppServices::new(RetailEngine::new(store, config.engine.clone())))
}
