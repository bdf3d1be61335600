pub mod health;
pub mod locations;
pub mod notifications;
pub mod requests;

use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};

use beacon_common::error::AppError;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(locations::router())
        .merge(notifications::router())
        .merge(requests::router())
        .with_state(state)
}

/// JSON body extractor whose rejections use the API error shape (400).
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Fallback for known paths hit with an unsupported method.
pub(crate) async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
