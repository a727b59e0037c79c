//! Application transactions over the retail store.
//!
//! Each public operation is one unit of work: begin a store transaction, take
//! the row locks it needs, ask the domain crates for a decision, write the
//! result and commit. A unit of work runs under `tx_timeout`; transient store
//! failures retry the whole unit with exponential backoff. Business-rule
//! failures are returned immediately and leave nothing behind, since the
//! uncommitted transaction is dropped.
//!
//! An expired `tx_timeout` is never retried: the attempt may have been cut
//! off while its commit was in flight, and running it again could apply the
//! same sale or return twice.

mod inventory;
mod products;
mod returns;
mod sales;

pub use products::ProductStock;
pub use returns::ReturnReceipt;

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use duka_core::DomainError;

use crate::config::EngineConfig;
use crate::store::{RetailStore, StoreError};

/// Engine operation error.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        last: String,
    },
}

impl EngineError {
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Store(e) => e.is_transient(),
            EngineError::Domain(_) | EngineError::Timeout(_) | EngineError::RetriesExhausted { .. } => {
                false
            }
        }
    }
}

/// The retail engine: every inventory, sales and returns operation.
#[derive(Clone)]
pub struct RetailEngine {
    store: Arc<dyn RetailStore>,
    config: EngineConfig,
}

impl RetailEngine {
    pub fn new(store: Arc<dyn RetailStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Run `attempt` under the transaction timeout, retrying transient failures.
    async fn run<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let policy = &self.config.retry;
        let mut attempts = 0;
        loop {
            attempts += 1;
            let outcome = match tokio::time::timeout(self.config.tx_timeout, attempt()).await {
                Ok(result) => result,
                Err(_) => Err(EngineError::Timeout(operation)),
            };

            match outcome {
                Err(err) if err.is_transient() => {
                    if !policy.should_retry(attempts) {
                        return Err(EngineError::RetriesExhausted {
                            operation,
                            attempts,
                            last: err.to_string(),
                        });
                    }
                    let delay = policy.delay_for_attempt(attempts);
                    warn!(
                        operation,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use crate::retry::RetryPolicy;
    use crate::store::InMemoryStore;

    fn engine(max_attempts: u32, tx_timeout: Duration) -> RetailEngine {
        RetailEngine::new(
            Arc::new(InMemoryStore::new()),
            EngineConfig {
                tx_timeout,
                retry: RetryPolicy::exponential(max_attempts, Duration::from_millis(1), Duration::from_millis(5)),
                ..EngineConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let engine = engine(3, Duration::from_secs(1));
        let calls = &AtomicU32::new(0);

        let result = engine
            .run("flaky", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(EngineError::Store(StoreError::Transient("40001".into())))
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn domain_failures_are_not_retried() {
        let engine = engine(3, Duration::from_secs(1));
        let calls = &AtomicU32::new(0);

        let err = engine
            .run("invalid", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(EngineError::Domain(DomainError::validation("nope")))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Domain(DomainError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_attempts_time_out_without_running_again() {
        let engine = engine(3, Duration::from_millis(10));
        let calls = &AtomicU32::new(0);

        let err = engine
            .run("slow", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, EngineError>(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Timeout("slow")));
        assert!(!err.is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn persistent_transient_failures_exhaust_retries() {
        let engine = engine(2, Duration::from_secs(1));
        let calls = &AtomicU32::new(0);

        let err = engine
            .run("contended", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(EngineError::Store(StoreError::Transient("55P03".into())))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::RetriesExhausted { attempts: 2, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
