//! Worker location ingestion.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use beacon_common::error::AppError;
use beacon_engine::LocationUpdate;

use crate::middleware::auth::AuthWorker;
use crate::routes::{JsonBody, method_not_allowed};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/locations",
        post(update_location).fallback(method_not_allowed),
    )
}

/// POST /api/locations: Upsert the caller's location and push token.
async fn update_location(
    State(state): State<AppState>,
    auth: AuthWorker,
    JsonBody(update): JsonBody<LocationUpdate>,
) -> Result<Json<Value>, AppError> {
    state.registry.register(auth.worker_id, &update).await?;
    Ok(Json(json!({ "success": true })))
}
