//! Execution slots.
//!
//! Every trigger runs as its own task holding one of a fixed number of
//! permits, under a hard timeout. A timed-out execution is dropped where it
//! stands; whatever it already committed stays committed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct ExecutionGate {
    permits: Arc<Semaphore>,
    timeout: Duration,
}

/// A reserved execution slot, released when its task finishes.
pub struct Slot {
    permit: OwnedSemaphorePermit,
    timeout: Duration,
}

impl ExecutionGate {
    pub fn new(max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            timeout,
        }
    }

    /// Wait until a slot is free.
    ///
    /// Callers reserve before taking work off a trigger source, so nothing is
    /// pulled that cannot start right away.
    pub async fn reserve(&self) -> Result<Slot, AcquireError> {
        let permit = self.permits.clone().acquire_owned().await?;
        Ok(Slot {
            permit,
            timeout: self.timeout,
        })
    }

    /// Slots not currently reserved.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl Slot {
    /// Run `task` in the background within this slot.
    pub fn spawn<F>(self, execution: &'static str, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn_with_cleanup(execution, task, std::future::ready(()))
    }

    /// Like [`Slot::spawn`], running `on_timeout` if `task` is cut off.
    ///
    /// The slot stays held until `on_timeout` finishes.
    pub fn spawn_with_cleanup<F, C>(
        self,
        execution: &'static str,
        task: F,
        on_timeout: C,
    ) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
        C: Future<Output = ()> + Send + 'static,
    {
        let Slot { permit, timeout } = self;
        tokio::spawn(async move {
            let _permit = permit;
            if tokio::time::timeout(timeout, task).await.is_err() {
                tracing::error!(
                    execution,
                    timeout_secs = timeout.as_secs_f64(),
                    "Execution timed out"
                );
                on_timeout.await;
            }
        })
    }
}
