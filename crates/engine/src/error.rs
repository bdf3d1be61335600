use beacon_common::error::AppError;
use thiserror::Error;

/// Errors surfaced by the fan-out entry points.
///
/// Batch transport failures never appear here: the dispatcher isolates them
/// per batch and reports them as undelivered counts.
#[derive(Debug, Error)]
pub enum FanOutError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Geo lookup failed: {0}")]
    Lookup(#[source] AppError),

    #[error("Token deactivation failed: {0}")]
    HygieneWrite(#[source] AppError),

    #[error("Unhandled error: {0}")]
    Unhandled(#[from] AppError),
}

impl FanOutError {
    /// Stable identifier written into dispatch error annotations.
    pub fn kind(&self) -> &'static str {
        match self {
            FanOutError::Validation(_) => "validation_error",
            FanOutError::Lookup(_) => "lookup_error",
            FanOutError::HygieneWrite(_) => "hygiene_write_error",
            FanOutError::Unhandled(_) => "unhandled_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_distinct() {
        let errors = [
            FanOutError::Validation("x".into()),
            FanOutError::Lookup(AppError::Internal("x".into())),
            FanOutError::HygieneWrite(AppError::Internal("x".into())),
            FanOutError::Unhandled(AppError::Internal("x".into())),
        ];
        let mut kinds: Vec<&str> = errors.iter().map(|e| e.kind()).collect();
        kinds.dedup();
        assert_eq!(kinds.len(), 4);
    }

    #[test]
    fn test_app_error_converts_to_unhandled() {
        let err: FanOutError = AppError::NotFound("request".into()).into();
        assert_eq!(err.kind(), "unhandled_error");
        assert!(err.to_string().contains("request"));
    }
}
