//! Direct single-device sends.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use beacon_common::error::AppError;
use beacon_notifier::{NotificationKind, PayloadBuilder, PushMessage};

use crate::routes::{JsonBody, method_not_allowed};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/notifications/send",
        post(send_notification).fallback(method_not_allowed),
    )
}

#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    pub token: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub data: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationResponse {
    pub success: bool,
    pub message_id: String,
}

/// POST /api/notifications/send: Send one notification to one device.
async fn send_notification(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SendNotificationRequest>,
) -> Result<Json<SendNotificationResponse>, AppError> {
    let (Some(token), Some(title), Some(body)) = (
        present(req.token.as_deref()),
        present(req.title.as_deref()),
        present(req.body.as_deref()),
    ) else {
        return Err(AppError::missing_fields());
    };

    let data = req
        .data
        .as_ref()
        .map(PayloadBuilder::string_data)
        .unwrap_or_default();
    let payload =
        PayloadBuilder::build(NotificationKind::Individual, Some(title), Some(body), data);
    let message = PushMessage::new(token, payload);

    let message_id = state.push.send(&message).await.map_err(|e| {
        tracing::error!(error = %e, "Direct send failed");
        AppError::from(e)
    })?;

    tracing::info!(message_id = %message_id, "Direct notification sent");

    Ok(Json(SendNotificationResponse {
        success: true,
        message_id,
    }))
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
