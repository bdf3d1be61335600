//! Radius queries over worker locations.
//!
//! The store answers geohash prefix lookups, which over-fetch (cell corners
//! lie outside the circle). Every candidate is re-checked here against the
//! exact haversine distance, so callers only ever see workers inside the
//! radius.

use std::collections::HashSet;
use std::sync::Arc;

use beacon_common::types::{GeoPoint, WorkerLocation};

use crate::distance;
use crate::error::FanOutError;
use crate::geohash;
use crate::store::WorkerStore;

/// An eligible worker and its distance from the query center.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyWorker {
    pub location: WorkerLocation,
    pub distance_km: f64,
}

pub struct GeoIndex {
    workers: Arc<dyn WorkerStore>,
}

impl GeoIndex {
    pub fn new(workers: Arc<dyn WorkerStore>) -> Self {
        Self { workers }
    }

    /// Active workers offering exactly `service` within `radius_km` of `center`.
    ///
    /// Results are unordered. A failed store query aborts the whole lookup.
    pub async fn find_nearby(
        &self,
        center: GeoPoint,
        radius_km: f64,
        service: &str,
    ) -> Result<Vec<NearbyWorker>, FanOutError> {
        let prefixes = geohash::query_prefixes(center, radius_km);

        let mut seen = HashSet::new();
        let mut nearby = Vec::new();
        let mut candidates = 0usize;

        for prefix in &prefixes {
            let rows = self
                .workers
                .find_active_by_geohash_prefix(service, prefix)
                .await
                .map_err(FanOutError::Lookup)?;

            for location in rows {
                candidates += 1;
                if !location.active || location.service != service {
                    continue;
                }
                if !seen.insert(location.worker_id) {
                    continue;
                }

                let distance_km = distance::between(center, location.position());
                if distance_km <= radius_km {
                    nearby.push(NearbyWorker {
                        location,
                        distance_km,
                    });
                }
            }
        }

        tracing::debug!(
            center = %center,
            radius_km,
            service,
            prefixes = prefixes.len(),
            candidates,
            matched = nearby.len(),
            "Geo lookup complete"
        );

        Ok(nearby)
    }
}
