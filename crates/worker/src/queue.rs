//! Notification-job trigger.

use std::sync::Arc;
use std::time::Duration;

use beacon_engine::FanOutOrchestrator;
use beacon_engine::store::JobStore;
use beacon_engine::store::queue::RedisJobQueue;

use crate::gate::ExecutionGate;

/// How long one blocking pop waits before looping.
pub const POP_TIMEOUT_SECS: f64 = 5.0;

const ERROR_BACKOFF: Duration = Duration::from_secs(1);

pub struct QueueConsumer {
    queue: RedisJobQueue,
    orchestrator: Arc<FanOutOrchestrator>,
    gate: ExecutionGate,
}

impl QueueConsumer {
    pub fn new(
        queue: RedisJobQueue,
        orchestrator: Arc<FanOutOrchestrator>,
        gate: ExecutionGate,
    ) -> Self {
        Self {
            queue,
            orchestrator,
            gate,
        }
    }

    /// Drain queued jobs until the task is cancelled.
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!("Consuming notification jobs");

        loop {
            let slot = self.gate.reserve().await?;

            let job = match self.queue.next(POP_TIMEOUT_SECS).await {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to pop notification job");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                    continue;
                }
            };

            tracing::debug!(job_id = %job.id, tokens = job.tokens.len(), "Picked up job");
            let job_id = job.id;
            let orchestrator = self.orchestrator.clone();
            let queue = self.queue.clone();
            slot.spawn_with_cleanup(
                "notification_job",
                async move {
                    orchestrator.drain_job(&job).await;
                },
                // The id is already off the list; retire the body too
                async move {
                    if let Err(e) = queue.delete(job_id).await {
                        tracing::error!(
                            job_id = %job_id,
                            error = %e,
                            "Failed to delete timed-out job"
                        );
                    }
                },
            );
        }
    }
}
