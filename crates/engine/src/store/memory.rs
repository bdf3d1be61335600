//! In-memory repositories.
//!
//! Behave like the production stores, record the calls they receive, and can
//! be scripted to fail so partial-failure paths are exercisable without a
//! database.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use tokio::sync::Mutex;
use uuid::Uuid;

use beacon_common::error::AppError;
use beacon_common::types::{
    DispatchFailure, DispatchSummary, NotificationJob, ServiceRequest, WorkerLocation,
};

use super::{JobStore, ProfileStore, RequestStore, WorkerStore};

/// In-memory [`WorkerStore`].
#[derive(Default)]
pub struct MemoryWorkerStore {
    rows: Mutex<HashMap<Uuid, WorkerLocation>>,
    fail_queries: AtomicBool,
    failing_chunk_tokens: HashSet<String>,
    query_count: AtomicUsize,
    deactivation_calls: Mutex<Vec<Vec<String>>>,
}

impl MemoryWorkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any deactivation chunk that includes `token`.
    pub fn fail_deactivation_containing(mut self, token: impl Into<String>) -> Self {
        self.failing_chunk_tokens.insert(token.into());
        self
    }

    /// Make every geohash query fail until switched off again.
    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub async fn insert(&self, location: WorkerLocation) {
        self.rows.lock().await.insert(location.worker_id, location);
    }

    pub async fn get(&self, worker_id: Uuid) -> Option<WorkerLocation> {
        self.rows.lock().await.get(&worker_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    /// Number of geohash queries served (including failed ones).
    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::SeqCst)
    }

    /// Token chunks passed to `deactivate_tokens`, in arrival order.
    pub async fn deactivation_calls(&self) -> Vec<Vec<String>> {
        self.deactivation_calls.lock().await.clone()
    }
}

#[async_trait]
impl WorkerStore for MemoryWorkerStore {
    async fn find_active_by_geohash_prefix(
        &self,
        service: &str,
        prefix: &str,
    ) -> Result<Vec<WorkerLocation>, AppError> {
        self.query_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(AppError::Internal("scripted query failure".to_string()));
        }

        let rows = self.rows.lock().await;
        Ok(rows
            .values()
            .filter(|r| r.active && r.service == service && r.geohash.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn upsert(&self, location: &WorkerLocation) -> Result<(), AppError> {
        self.rows
            .lock()
            .await
            .insert(location.worker_id, location.clone());
        Ok(())
    }

    async fn deactivate_tokens(&self, tokens: &[String], reason: &str) -> Result<u64, AppError> {
        self.deactivation_calls.lock().await.push(tokens.to_vec());

        if tokens.iter().any(|t| self.failing_chunk_tokens.contains(t)) {
            return Err(AppError::Internal("scripted commit failure".to_string()));
        }

        let wanted: HashSet<&String> = tokens.iter().collect();
        let mut rows = self.rows.lock().await;
        let mut updated = 0;
        for row in rows.values_mut().filter(|r| wanted.contains(&r.token)) {
            row.active = false;
            row.last_error = Some(reason.to_string());
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|_, r| r.last_updated >= cutoff);
        Ok((before - rows.len()) as u64)
    }
}

/// In-memory [`ProfileStore`].
#[derive(Default)]
pub struct MemoryProfileStore {
    tokens: Mutex<HashMap<Uuid, String>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_token(&self, user_id: Uuid) -> Option<String> {
        self.tokens.lock().await.get(&user_id).cloned()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn set_push_token(&self, user_id: Uuid, token: &str) -> Result<(), AppError> {
        self.tokens.lock().await.insert(user_id, token.to_string());
        Ok(())
    }
}

/// In-memory [`RequestStore`].
#[derive(Default)]
pub struct MemoryRequestStore {
    requests: Mutex<HashMap<Uuid, ServiceRequest>>,
    write_count: AtomicUsize,
}

impl MemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, request: ServiceRequest) {
        self.requests.lock().await.insert(request.id, request);
    }

    /// Number of annotation writes attempted.
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    async fn annotate(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut ServiceRequest),
    ) -> Result<(), AppError> {
        self.write_count.fetch_add(1, Ordering::SeqCst);

        let mut requests = self.requests.lock().await;
        match requests.get_mut(&id) {
            Some(request)
                if request.dispatch_result.is_none() && request.dispatch_error.is_none() =>
            {
                apply(request);
                Ok(())
            }
            _ => Err(AppError::NotFound(format!(
                "Request {} not found or already annotated",
                id
            ))),
        }
    }
}

#[async_trait]
impl RequestStore for MemoryRequestStore {
    async fn get(&self, id: Uuid) -> Result<Option<ServiceRequest>, AppError> {
        Ok(self.requests.lock().await.get(&id).cloned())
    }

    async fn record_dispatch_result(
        &self,
        id: Uuid,
        summary: &DispatchSummary,
    ) -> Result<(), AppError> {
        let summary = summary.clone();
        self.annotate(id, |r| r.dispatch_result = Some(Json(summary)))
            .await
    }

    async fn record_dispatch_error(
        &self,
        id: Uuid,
        failure: &DispatchFailure,
    ) -> Result<(), AppError> {
        let failure = failure.clone();
        self.annotate(id, |r| r.dispatch_error = Some(Json(failure)))
            .await
    }
}

/// In-memory [`JobStore`].
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<Uuid, NotificationJob>>,
    deleted: Mutex<Vec<Uuid>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, job: NotificationJob) {
        self.jobs.lock().await.insert(job.id, job);
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.jobs.lock().await.contains_key(&id)
    }

    /// Ids passed to `delete`, in call order.
    pub async fn deleted(&self) -> Vec<Uuid> {
        self.deleted.lock().await.clone()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        self.jobs.lock().await.remove(&id);
        self.deleted.lock().await.push(id);
        Ok(())
    }
}
