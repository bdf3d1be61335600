//! Worker location ingestion.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use beacon_common::error::AppError;
use beacon_common::types::{GeoPoint, WorkerLocation};

use crate::geohash;
use crate::store::{ProfileStore, WorkerStore};

/// Location update as posted by a worker's device.
///
/// Every field is optional on the wire so absence can be reported as a
/// validation error instead of a deserialisation failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub device_token: Option<String>,
    pub service: Option<String>,
}

pub struct LocationRegistry {
    workers: Arc<dyn WorkerStore>,
    profiles: Arc<dyn ProfileStore>,
}

impl LocationRegistry {
    pub fn new(workers: Arc<dyn WorkerStore>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self { workers, profiles }
    }

    /// Overwrite the worker's location record and profile push token.
    ///
    /// A fresh update re-activates a registration previously deactivated by
    /// token hygiene.
    pub async fn register(
        &self,
        worker_id: Uuid,
        update: &LocationUpdate,
    ) -> Result<WorkerLocation, AppError> {
        let (Some(latitude), Some(longitude)) = (update.latitude, update.longitude) else {
            return Err(AppError::missing_fields());
        };
        let token =
            non_blank(update.device_token.as_deref()).ok_or_else(AppError::missing_fields)?;
        let service =
            non_blank(update.service.as_deref()).ok_or_else(AppError::missing_fields)?;

        let position = GeoPoint::new(latitude, longitude);
        if !position.is_valid() {
            return Err(AppError::Validation(format!(
                "Coordinates out of range: {}",
                position
            )));
        }

        let location = WorkerLocation {
            worker_id,
            latitude,
            longitude,
            geohash: geohash::encode(position, geohash::STORED_PRECISION),
            service: service.to_string(),
            token: token.to_string(),
            active: true,
            last_error: None,
            last_updated: Utc::now(),
        };

        self.workers.upsert(&location).await?;
        self.profiles.set_push_token(worker_id, token).await?;

        tracing::info!(
            worker_id = %worker_id,
            service,
            geohash = %location.geohash,
            "Worker location updated"
        );

        Ok(location)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{MemoryProfileStore, MemoryWorkerStore};

    fn update() -> LocationUpdate {
        LocationUpdate {
            latitude: Some(37.0),
            longitude: Some(-122.0),
            device_token: Some("device-1".to_string()),
            service: Some("plumbing".to_string()),
        }
    }

    fn registry() -> (LocationRegistry, Arc<MemoryWorkerStore>, Arc<MemoryProfileStore>) {
        let workers = Arc::new(MemoryWorkerStore::new());
        let profiles = Arc::new(MemoryProfileStore::new());
        (
            LocationRegistry::new(workers.clone(), profiles.clone()),
            workers,
            profiles,
        )
    }

    #[tokio::test]
    async fn test_register_upserts_location_and_profile() {
        let (registry, workers, profiles) = registry();
        let worker_id = Uuid::new_v4();

        let stored = registry.register(worker_id, &update()).await.unwrap();

        assert_eq!(stored.geohash.len(), geohash::STORED_PRECISION);
        assert!(stored.active);
        assert_eq!(workers.get(worker_id).await, Some(stored));
        assert_eq!(profiles.push_token(worker_id).await.as_deref(), Some("device-1"));
    }

    #[tokio::test]
    async fn test_register_overwrites_and_reactivates() {
        let (registry, workers, _) = registry();
        let worker_id = Uuid::new_v4();
        registry.register(worker_id, &update()).await.unwrap();
        workers
            .deactivate_tokens(&["device-1".to_string()], "Invalid token")
            .await
            .unwrap();

        let mut moved = update();
        moved.latitude = Some(37.5);
        moved.device_token = Some("device-2".to_string());
        registry.register(worker_id, &moved).await.unwrap();

        let row = workers.get(worker_id).await.unwrap();
        assert_eq!(workers.len().await, 1);
        assert_eq!(row.latitude, 37.5);
        assert_eq!(row.token, "device-2");
        assert!(row.active);
        assert!(row.last_error.is_none());
    }

    #[tokio::test]
    async fn test_missing_fields_are_rejected() {
        let (registry, workers, _) = registry();
        let cases = [
            LocationUpdate { latitude: None, ..update() },
            LocationUpdate { longitude: None, ..update() },
            LocationUpdate { device_token: Some("  ".into()), ..update() },
            LocationUpdate { service: None, ..update() },
        ];

        for case in cases {
            let err = registry.register(Uuid::new_v4(), &case).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(ref m) if m == "Missing required fields"));
        }
        assert!(workers.is_empty().await);
    }

    #[tokio::test]
    async fn test_zero_coordinates_are_accepted() {
        let (registry, _, _) = registry();
        let equator = LocationUpdate {
            latitude: Some(0.0),
            longitude: Some(0.0),
            ..update()
        };
        assert!(registry.register(Uuid::new_v4(), &equator).await.is_ok());
    }

    #[tokio::test]
    async fn test_out_of_range_is_rejected() {
        let (registry, _, _) = registry();
        let bad = LocationUpdate {
            latitude: Some(95.0),
            ..update()
        };
        assert!(matches!(
            registry.register(Uuid::new_v4(), &bad).await,
            Err(AppError::Validation(_))
        ));
    }
}
