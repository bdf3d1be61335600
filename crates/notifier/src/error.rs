use thiserror::Error;

use beacon_common::error::AppError;

/// Failures talking to the push provider.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("Push authentication failed: {0}")]
    Auth(String),

    #[error("Push transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Push provider unavailable: {0}")]
    Unavailable(String),

    #[error("Message rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Batch of {size} messages exceeds the provider ceiling of {max}")]
    BatchTooLarge { size: usize, max: usize },
}

impl From<PushError> for AppError {
    fn from(err: PushError) -> Self {
        AppError::Push(err.to_string())
    }
}
