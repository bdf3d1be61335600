//! Request-created trigger.
//!
//! An insert trigger on `service_requests` publishes each new request id on
//! [`REQUEST_CHANNEL`]. Notifications raised while nobody listens are not
//! replayed.

use std::sync::Arc;

use sqlx::PgPool;
use sqlx::postgres::PgListener;
use uuid::Uuid;

use beacon_engine::FanOutOrchestrator;

use crate::gate::ExecutionGate;

pub const REQUEST_CHANNEL: &str = "service_request_created";

pub struct RequestListener {
    pool: PgPool,
    orchestrator: Arc<FanOutOrchestrator>,
    gate: ExecutionGate,
}

impl RequestListener {
    pub fn new(pool: PgPool, orchestrator: Arc<FanOutOrchestrator>, gate: ExecutionGate) -> Self {
        Self {
            pool,
            orchestrator,
            gate,
        }
    }

    /// Listen for new requests until the task is cancelled.
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(REQUEST_CHANNEL).await?;
        tracing::info!(channel = REQUEST_CHANNEL, "Listening for new requests");

        loop {
            let slot = self.gate.reserve().await?;
            let notification = listener.recv().await?;

            let Ok(request_id) = Uuid::parse_str(notification.payload()) else {
                tracing::warn!(
                    payload = notification.payload(),
                    "Ignoring notification with invalid request id"
                );
                continue;
            };

            let orchestrator = self.orchestrator.clone();
            slot.spawn("request_created", async move {
                // Already annotated on the request; the error stops here
                if let Err(e) = orchestrator.on_request_id(request_id).await {
                    tracing::error!(
                        request_id = %request_id,
                        kind = e.kind(),
                        error = %e,
                        "Request execution failed"
                    );
                }
            });
        }
    }
}
