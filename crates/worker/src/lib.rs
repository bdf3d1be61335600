//! Trigger host for the fan-out engine.
//!
//! Turns database notifications and queued jobs into bounded, time-limited
//! executions of the orchestrator entry points, and runs the retention sweep
//! on a timer.

pub mod gate;
pub mod listener;
pub mod queue;
pub mod sweeper;

use std::sync::Arc;

use beacon_common::config::AppConfig;
use beacon_engine::store::{JobStore, RequestStore, WorkerStore};
use beacon_engine::{FanOutOrchestrator, GeoIndex, TokenHygieneService};
use beacon_notifier::{BatchDispatcher, PushProvider};

/// Wire an orchestrator from its collaborators and the tuning in `config`.
pub fn build_orchestrator(
    config: &AppConfig,
    workers: Arc<dyn WorkerStore>,
    requests: Arc<dyn RequestStore>,
    jobs: Arc<dyn JobStore>,
    push: Arc<dyn PushProvider>,
) -> FanOutOrchestrator {
    FanOutOrchestrator::new(
        GeoIndex::new(workers.clone()),
        BatchDispatcher::new(push, config.push.max_in_flight_batches),
        TokenHygieneService::new(workers, config.hygiene_max_in_flight_chunks),
        requests,
        jobs,
    )
}
