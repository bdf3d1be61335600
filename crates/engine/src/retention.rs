//! Periodic deletion of stale worker locations.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use beacon_common::error::AppError;

use crate::store::WorkerStore;

pub struct RetentionSweep {
    workers: Arc<dyn WorkerStore>,
    retention: Duration,
}

impl RetentionSweep {
    pub fn new(workers: Arc<dyn WorkerStore>, retention_days: i64) -> Self {
        Self {
            workers,
            retention: Duration::days(retention_days),
        }
    }

    /// Delete locations not updated within the retention window before `now`.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let cutoff = now - self.retention;
        let deleted = self.workers.delete_stale(cutoff).await?;

        tracing::info!(cutoff = %cutoff, deleted, "Retention sweep complete");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    use beacon_common::types::WorkerLocation;

    use crate::store::memory::MemoryWorkerStore;

    fn location_updated_at(last_updated: DateTime<Utc>) -> WorkerLocation {
        WorkerLocation {
            worker_id: Uuid::new_v4(),
            latitude: 1.0,
            longitude: 1.0,
            geohash: "s00twy01m".to_string(),
            service: "cleaning".to_string(),
            token: "t".to_string(),
            active: true,
            last_error: None,
            last_updated,
        }
    }

    #[tokio::test]
    async fn test_deletes_only_stale_rows() {
        let now = Utc::now();
        let store = Arc::new(MemoryWorkerStore::new());
        let fresh = location_updated_at(now - Duration::days(29));
        store.insert(fresh.clone()).await;
        store.insert(location_updated_at(now - Duration::days(31))).await;
        store.insert(location_updated_at(now - Duration::days(400))).await;

        let deleted = RetentionSweep::new(store.clone(), 30).run(now).await.unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(store.len().await, 1);
        assert!(store.get(fresh.worker_id).await.is_some());
    }

    #[tokio::test]
    async fn test_empty_store_sweeps_nothing() {
        let store = Arc::new(MemoryWorkerStore::new());
        let deleted = RetentionSweep::new(store, 30).run(Utc::now()).await.unwrap();
        assert_eq!(deleted, 0);
    }
}
