//! Executors that run engine calls.
//!
//! Engine calls are synchronous and may block on I/O. `BlockingPoolExecutor`
//! runs them on Tokio's blocking pool, bounded by a semaphore, so a slow
//! engine never stalls the tasks that dispatch order events.

use crate::error::AttemptError;
use async_trait::async_trait;
use order_core::{EngineFault, OrderHandle};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::error;

/// One engine call. Must be safe to invoke again on retry.
pub type OrderCallable = Arc<dyn Fn() -> Result<OrderHandle, EngineFault> + Send + Sync>;

/// Runs engine calls.
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    async fn run(&self, callable: OrderCallable) -> Result<OrderHandle, AttemptError>;
}

/// Runs calls on the blocking pool, at most `max_concurrent` at a time.
#[derive(Debug, Clone)]
pub struct BlockingPoolExecutor {
    permits: Arc<Semaphore>,
}

impl BlockingPoolExecutor {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Calls that can start right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Reject all further calls.
    pub fn close(&self) {
        self.permits.close();
    }
}

#[async_trait]
impl OrderExecutor for BlockingPoolExecutor {
    async fn run(&self, callable: OrderCallable) -> Result<OrderHandle, AttemptError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| AttemptError::ExecutorClosed)?;

        let joined = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            callable()
        })
        .await;

        match joined {
            Ok(result) => result.map_err(AttemptError::from),
            Err(e) => {
                error!(error = %e, "engine call did not complete");
                Err(AttemptError::ExecutorPanicked)
            }
        }
    }
}

/// Runs calls on the calling task. Only for engines that never block.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

#[async_trait]
impl OrderExecutor for InlineExecutor {
    async fn run(&self, callable: OrderCallable) -> Result<OrderHandle, AttemptError> {
        callable().map_err(AttemptError::from)
    }
}
