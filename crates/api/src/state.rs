//! Shared application state for the Axum API server.

use std::sync::Arc;

use beacon_common::config::AppConfig;
use beacon_engine::LocationRegistry;
use beacon_engine::store::{ProfileStore, WorkerStore};
use beacon_notifier::PushProvider;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub registry: Arc<LocationRegistry>,
    pub push: Arc<dyn PushProvider>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        workers: Arc<dyn WorkerStore>,
        profiles: Arc<dyn ProfileStore>,
        push: Arc<dyn PushProvider>,
    ) -> Self {
        Self {
            config,
            registry: Arc::new(LocationRegistry::new(workers, profiles)),
            push,
        }
    }
}
