//! Scripted in-process push provider.
//!
//! Records every call and answers from a small script: tokens it rejects,
//! tokens it throttles, and batches (identified by any token they contain)
//! whose call fails outright.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use beacon_common::types::{DeliveryBatchResult, SendResponse};

use crate::error::PushError;
use crate::payload::PushMessage;
use crate::provider::PushProvider;

const UNREGISTERED: &str = "Requested entity was not found.";
const QUOTA_EXCEEDED: &str = "429 Too Many Requests: Quota exceeded";

#[derive(Default)]
pub struct MockPushProvider {
    rejected_tokens: HashSet<String>,
    throttled_tokens: HashSet<String>,
    failing_batch_tokens: HashSet<String>,
    batch_calls: Mutex<Vec<Vec<PushMessage>>>,
    single_sends: Mutex<Vec<PushMessage>>,
    next_id: AtomicU64,
}

impl MockPushProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer sends to `token` with an "unregistered" rejection.
    pub fn reject_token(mut self, token: impl Into<String>) -> Self {
        self.rejected_tokens.insert(token.into());
        self
    }

    /// Answer sends to `token` with a quota error that says nothing about the token.
    pub fn throttle_token(mut self, token: impl Into<String>) -> Self {
        self.throttled_tokens.insert(token.into());
        self
    }

    /// Fail any batch call that includes `token` as a whole.
    pub fn fail_batch_containing(mut self, token: impl Into<String>) -> Self {
        self.failing_batch_tokens.insert(token.into());
        self
    }

    /// Every batch call received so far, in arrival order.
    pub async fn batch_calls(&self) -> Vec<Vec<PushMessage>> {
        self.batch_calls.lock().await.clone()
    }

    /// Every message that went out through a batch call.
    pub async fn batch_messages(&self) -> Vec<PushMessage> {
        self.batch_calls.lock().await.iter().flatten().cloned().collect()
    }

    /// Every single-send call received so far.
    pub async fn single_sends(&self) -> Vec<PushMessage> {
        self.single_sends.lock().await.clone()
    }

    fn message_id(&self) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("projects/mock/messages/{id}")
    }
}

#[async_trait]
impl PushProvider for MockPushProvider {
    async fn send(&self, message: &PushMessage) -> Result<String, PushError> {
        self.single_sends.lock().await.push(message.clone());

        if self.rejected_tokens.contains(&message.token) {
            return Err(PushError::Rejected {
                status: 404,
                message: UNREGISTERED.to_string(),
            });
        }
        if self.throttled_tokens.contains(&message.token) {
            return Err(PushError::Unavailable(QUOTA_EXCEEDED.to_string()));
        }
        Ok(self.message_id())
    }

    async fn send_batch(&self, messages: &[PushMessage]) -> Result<DeliveryBatchResult, PushError> {
        self.batch_calls.lock().await.push(messages.to_vec());

        if messages
            .iter()
            .any(|m| self.failing_batch_tokens.contains(&m.token))
        {
            return Err(PushError::Unavailable("scripted batch failure".to_string()));
        }

        let responses = messages
            .iter()
            .map(|m| {
                if self.rejected_tokens.contains(&m.token) {
                    SendResponse::failed(UNREGISTERED)
                } else if self.throttled_tokens.contains(&m.token) {
                    SendResponse::unavailable(QUOTA_EXCEEDED)
                } else {
                    SendResponse::delivered(self.message_id())
                }
            })
            .collect();

        Ok(DeliveryBatchResult::from_responses(responses))
    }
}
