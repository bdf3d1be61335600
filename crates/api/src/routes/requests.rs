//! Service request intake.
//!
//! Validates and logs submissions without dispatching them; dispatch is
//! driven by request rows landing in the database.

use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};

use beacon_common::error::AppError;
use beacon_common::types::GeoPoint;

use crate::routes::{JsonBody, method_not_allowed};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/requests/intake",
        post(intake_request).fallback(method_not_allowed),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeRequest {
    pub service: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// POST /api/requests/intake: Validate and acknowledge a service request.
async fn intake_request(
    JsonBody(req): JsonBody<IntakeRequest>,
) -> Result<Json<Value>, AppError> {
    let service = req
        .service
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(AppError::missing_fields)?;
    let (Some(latitude), Some(longitude)) = (req.latitude, req.longitude) else {
        return Err(AppError::missing_fields());
    };

    let location = GeoPoint::new(latitude, longitude);
    if !location.is_valid() {
        return Err(AppError::Validation(format!(
            "Coordinates out of range: {}",
            location
        )));
    }

    tracing::info!(
        service,
        location = %location,
        images = req.image_urls.len(),
        has_description = req.description.is_some(),
        "Service request received"
    );

    Ok(Json(json!({ "message": "Request received successfully" })))
}
