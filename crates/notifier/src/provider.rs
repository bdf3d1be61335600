use async_trait::async_trait;

use beacon_common::types::DeliveryBatchResult;

use crate::error::PushError;
use crate::payload::PushMessage;

/// A push notification provider.
///
/// Implementations are shared across tasks behind an `Arc<dyn PushProvider>`.
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Send a single message, returning the provider's message identifier.
    async fn send(&self, message: &PushMessage) -> Result<String, PushError>;

    /// Send up to [`crate::PUSH_BATCH_SIZE`] messages in one call.
    ///
    /// `Ok` carries one response per message, in input order. `Err` means the
    /// call as a whole failed and no per-recipient result is known.
    async fn send_batch(&self, messages: &[PushMessage]) -> Result<DeliveryBatchResult, PushError>;
}
