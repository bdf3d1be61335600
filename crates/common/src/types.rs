use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// Search radius applied when a request does not carry a usable one.
pub const DEFAULT_RADIUS_KM: f64 = 10.0;

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components are finite and inside their degree ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// A worker's last reported position and push registration.
///
/// One row per worker; every location update overwrites it. The same row is
/// the geo-index membership record and the token deactivation target, so
/// flipping `active` takes effect on the very next match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WorkerLocation {
    pub worker_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    /// 9-character geohash of the position, used for prefix lookups
    pub geohash: String,
    pub service: String,
    /// Push device token
    pub token: String,
    pub active: bool,
    pub last_error: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl WorkerLocation {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Outcome annotation written onto a request after a successful fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub total_matched: u32,
    pub total_sent: u32,
    pub total_failed: u32,
    /// Recipients whose whole batch failed at the transport level
    pub total_undelivered: u32,
    pub tokens_deactivated: u32,
    pub dispatched_at: DateTime<Utc>,
}

/// Error annotation written onto a request when the fan-out pipeline fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchFailure {
    pub kind: String,
    pub message: String,
    pub failed_at: DateTime<Utc>,
}

/// A client-submitted service request.
///
/// Location and service are optional at the storage level; requests missing
/// them are dropped by the orchestrator rather than rejected on insert.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServiceRequest {
    pub id: Uuid,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub service: Option<String>,
    pub radius_km: Option<f64>,
    pub description: Option<String>,
    pub image_urls: Vec<String>,
    pub dispatch_result: Option<Json<DispatchSummary>>,
    pub dispatch_error: Option<Json<DispatchFailure>>,
    pub created_at: DateTime<Utc>,
}

impl ServiceRequest {
    /// Origin of the request, if both coordinates are present and in range.
    pub fn location(&self) -> Option<GeoPoint> {
        let point = GeoPoint::new(self.latitude?, self.longitude?);
        point.is_valid().then_some(point)
    }

    /// Requested service category, if present and non-blank.
    pub fn service(&self) -> Option<&str> {
        self.service.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Search radius in kilometres, falling back to [`DEFAULT_RADIUS_KM`] for
    /// missing, non-finite or non-positive values.
    pub fn radius_km(&self) -> f64 {
        match self.radius_km {
            Some(r) if r.is_finite() && r > 0.0 => r,
            _ => DEFAULT_RADIUS_KM,
        }
    }
}

/// A queued bulk notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationJob {
    pub id: Uuid,
    pub title: Option<String>,
    pub body: Option<String>,
    /// Extra key/value data forwarded to the devices
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub tokens: Vec<String>,
}

/// Per-recipient delivery result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub token: String,
    pub success: bool,
    pub error: Option<String>,
    /// The failure says nothing about the token (quota, outage, timeout)
    #[serde(default)]
    pub retryable: bool,
}

/// Provider answer for a single message inside a batch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub retryable: bool,
}

impl SendResponse {
    pub fn delivered(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
            retryable: false,
        }
    }

    /// The provider rejected this recipient.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
            retryable: false,
        }
    }

    /// The send failed for a reason unrelated to the recipient.
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            retryable: true,
            ..Self::failed(error)
        }
    }
}

/// Result of one provider batch call.
///
/// `responses` is positionally aligned with the messages that were sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryBatchResult {
    pub success_count: u32,
    pub failure_count: u32,
    pub responses: Vec<SendResponse>,
}

impl DeliveryBatchResult {
    pub fn from_responses(responses: Vec<SendResponse>) -> Self {
        let success_count = responses.iter().filter(|r| r.success).count() as u32;
        let failure_count = responses.len() as u32 - success_count;
        Self {
            success_count,
            failure_count,
            responses,
        }
    }
}
