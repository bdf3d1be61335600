//! Repository interfaces for the fan-out engine.
//!
//! Components receive these as `Arc<dyn ...>` handles. [`postgres`] and
//! [`queue`] back production; [`memory`] backs tests and local runs.

pub mod memory;
pub mod postgres;
pub mod queue;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use beacon_common::error::AppError;
use beacon_common::types::{
    DispatchFailure, DispatchSummary, ServiceRequest, WorkerLocation,
};

/// Worker location / push registration records.
#[async_trait]
pub trait WorkerStore: Send + Sync {
    /// Active rows for `service` whose geohash starts with `prefix`.
    ///
    /// An empty prefix matches every active row for the service.
    async fn find_active_by_geohash_prefix(
        &self,
        service: &str,
        prefix: &str,
    ) -> Result<Vec<WorkerLocation>, AppError>;

    /// Insert or overwrite the row for `location.worker_id`.
    async fn upsert(&self, location: &WorkerLocation) -> Result<(), AppError>;

    /// Mark every row holding one of `tokens` inactive, in one transaction.
    ///
    /// Returns the number of rows updated.
    async fn deactivate_tokens(&self, tokens: &[String], reason: &str) -> Result<u64, AppError>;

    /// Delete rows last updated before `cutoff`, returning how many went.
    async fn delete_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;
}

/// Auxiliary user profile data.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn set_push_token(&self, user_id: Uuid, token: &str) -> Result<(), AppError>;
}

/// Service requests and their dispatch annotations.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<ServiceRequest>, AppError>;

    /// Attach the success annotation. Fails if the request is unknown or
    /// already annotated.
    async fn record_dispatch_result(
        &self,
        id: Uuid,
        summary: &DispatchSummary,
    ) -> Result<(), AppError>;

    /// Attach the error annotation. Fails if the request is unknown or
    /// already annotated.
    async fn record_dispatch_error(
        &self,
        id: Uuid,
        failure: &DispatchFailure,
    ) -> Result<(), AppError>;
}

/// Queued notification jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn delete(&self, id: Uuid) -> Result<(), AppError>;
}
