//! Batch dispatcher: fans a recipient list out in provider-sized batches.
//!
//! For each dispatch:
//! 1. Split the messages into batches of at most [`PUSH_BATCH_SIZE`]
//! 2. Send up to `max_in_flight` batches concurrently, one provider call each
//! 3. Attribute per-recipient responses positionally to the batch slice
//! 4. Aggregate counters across batches
//!
//! A batch whose provider call fails as a whole is logged and counted as
//! undelivered. It produces no outcome rows, since the individual causes are
//! unknown, and the remaining batches still go out.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream;

use beacon_common::policy::FailurePolicy;
use beacon_common::types::{DeliveryBatchResult, DeliveryOutcome};

use crate::payload::PushMessage;
use crate::provider::PushProvider;

/// Hard per-call recipient ceiling of the push provider.
pub const PUSH_BATCH_SIZE: usize = 500;

const MISSING_RESPONSE: &str = "missing provider response";
const UNKNOWN_ERROR: &str = "Unknown error";

/// Aggregated result of one dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// One entry per recipient of every batch that reached the provider, in input order.
    pub outcomes: Vec<DeliveryOutcome>,
    pub success_count: u32,
    pub failure_count: u32,
    /// Recipients in batches whose provider call failed outright
    pub undelivered_count: u32,
    pub batches_attempted: u32,
    pub batches_failed: u32,
}

impl DispatchReport {
    /// Tokens the provider rejected as recipients.
    ///
    /// Retryable failures are left out: they say nothing about the token.
    pub fn failed_tokens(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| !o.success && !o.retryable)
            .map(|o| o.token.clone())
            .collect()
    }
}

enum BatchOutcome {
    Delivered(Vec<DeliveryOutcome>),
    TransportFailed { recipients: usize },
}

/// Sends recipient lists through a [`PushProvider`] in bounded batches.
pub struct BatchDispatcher {
    provider: Arc<dyn PushProvider>,
    max_in_flight: usize,
    policy: FailurePolicy,
}

impl BatchDispatcher {
    pub fn new(provider: Arc<dyn PushProvider>, max_in_flight: usize) -> Self {
        Self {
            provider,
            max_in_flight: max_in_flight.max(1),
            policy: FailurePolicy::PUSH_BATCH,
        }
    }

    /// Dispatch every message, returning per-recipient outcomes and totals.
    ///
    /// Never fails: batch-level errors are isolated per [`FailurePolicy::PUSH_BATCH`].
    pub async fn dispatch(&self, messages: &[PushMessage]) -> DispatchReport {
        let mut report = DispatchReport::default();
        if messages.is_empty() {
            return report;
        }

        let sends: Vec<_> = messages
            .chunks(PUSH_BATCH_SIZE)
            .enumerate()
            .map(|(index, batch)| self.send_batch(index, batch))
            .collect();
        let batch_outcomes: Vec<BatchOutcome> = stream::iter(sends)
            .buffered(self.max_in_flight)
            .collect()
            .await;

        for outcome in batch_outcomes {
            report.batches_attempted += 1;
            match outcome {
                BatchOutcome::Delivered(outcomes) => {
                    let successes = outcomes.iter().filter(|o| o.success).count() as u32;
                    report.success_count += successes;
                    report.failure_count += outcomes.len() as u32 - successes;
                    report.outcomes.extend(outcomes);
                }
                BatchOutcome::TransportFailed { recipients } => {
                    report.batches_failed += 1;
                    report.undelivered_count += recipients as u32;
                }
            }
        }

        tracing::info!(
            recipients = messages.len(),
            batches = report.batches_attempted,
            batches_failed = report.batches_failed,
            successful = report.success_count,
            failed = report.failure_count,
            undelivered = report.undelivered_count,
            "Dispatch complete"
        );

        report
    }

    async fn send_batch(&self, index: usize, batch: &[PushMessage]) -> BatchOutcome {
        let start = index * PUSH_BATCH_SIZE;
        let end = start + batch.len();

        for attempt in 1..=self.policy.attempts() {
            tracing::debug!(start, end, attempt, "Sending push batch");

            match self.provider.send_batch(batch).await {
                Ok(result) => {
                    tracing::info!(
                        start,
                        end,
                        successful = result.success_count,
                        failed = result.failure_count,
                        "Push batch sent"
                    );
                    return BatchOutcome::Delivered(Self::attribute(batch, result));
                }
                Err(e) => {
                    tracing::error!(start, end, attempt, error = %e, "Push batch failed");
                }
            }
        }

        BatchOutcome::TransportFailed {
            recipients: batch.len(),
        }
    }

    /// Pair each recipient with the response at the same position.
    pub(crate) fn attribute(
        batch: &[PushMessage],
        result: DeliveryBatchResult,
    ) -> Vec<DeliveryOutcome> {
        if result.responses.len() != batch.len() {
            tracing::warn!(
                expected = batch.len(),
                received = result.responses.len(),
                "Provider response count does not match batch size"
            );
        }

        let mut responses = result.responses.into_iter();
        batch
            .iter()
            .map(|message| match responses.next() {
                Some(response) if response.success => DeliveryOutcome {
                    token: message.token.clone(),
                    success: true,
                    error: None,
                    retryable: false,
                },
                Some(response) => DeliveryOutcome {
                    token: message.token.clone(),
                    success: false,
                    error: Some(response.error.unwrap_or_else(|| UNKNOWN_ERROR.to_string())),
                    retryable: response.retryable,
                },
                // No answer for this recipient, so nothing is known about its token
                None => DeliveryOutcome {
                    token: message.token.clone(),
                    success: false,
                    error: Some(MISSING_RESPONSE.to_string()),
                    retryable: true,
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use beacon_common::types::SendResponse;

    use crate::mock::MockPushProvider;
    use crate::payload::{NotificationKind, PayloadBuilder};

    fn messages(count: usize) -> Vec<PushMessage> {
        let payload = PayloadBuilder::build(
            NotificationKind::Broadcast,
            None,
            None,
            BTreeMap::new(),
        );
        (0..count)
            .map(|i| PushMessage::new(format!("token-{i}"), payload.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_empty_dispatch_makes_no_calls() {
        let provider = Arc::new(MockPushProvider::new());
        let dispatcher = BatchDispatcher::new(provider.clone(), 4);

        let report = dispatcher.dispatch(&[]).await;

        assert_eq!(report, DispatchReport::default());
        assert!(provider.batch_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_batch_count_is_ceiling_of_recipients() {
        for (recipients, expected_calls) in [(1, 1), (500, 1), (501, 2), (1000, 2), (1234, 3)] {
            let provider = Arc::new(MockPushProvider::new());
            let dispatcher = BatchDispatcher::new(provider.clone(), 4);

            let report = dispatcher.dispatch(&messages(recipients)).await;

            let calls = provider.batch_calls().await;
            assert_eq!(calls.len(), expected_calls, "recipients = {recipients}");
            assert!(calls.iter().all(|c| c.len() <= PUSH_BATCH_SIZE));
            assert_eq!(report.batches_attempted as usize, expected_calls);
            assert_eq!(report.outcomes.len(), recipients);
            assert_eq!(report.success_count as usize, recipients);
        }
    }

    #[tokio::test]
    async fn test_outcomes_preserve_input_order() {
        let provider = Arc::new(MockPushProvider::new());
        let dispatcher = BatchDispatcher::new(provider, 3);
        let input = messages(1234);

        let report = dispatcher.dispatch(&input).await;

        let tokens: Vec<&str> = report.outcomes.iter().map(|o| o.token.as_str()).collect();
        let expected: Vec<&str> = input.iter().map(|m| m.token.as_str()).collect();
        assert_eq!(tokens, expected);
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_abort_others() {
        // token-500 opens the second batch
        let provider = Arc::new(MockPushProvider::new().fail_batch_containing("token-500"));
        let dispatcher = BatchDispatcher::new(provider.clone(), 2);

        let report = dispatcher.dispatch(&messages(1200)).await;

        assert_eq!(provider.batch_calls().await.len(), 3);
        assert_eq!(report.batches_failed, 1);
        assert_eq!(report.undelivered_count, 500);
        assert_eq!(report.outcomes.len(), 700);
        assert_eq!(report.success_count, 700);
        assert_eq!(report.failure_count, 0);
        assert_eq!(report.outcomes[0].token, "token-0");
        assert_eq!(report.outcomes[499].token, "token-499");
        assert_eq!(report.outcomes[500].token, "token-1000");
        assert_eq!(report.outcomes[699].token, "token-1199");
    }

    #[tokio::test]
    async fn test_rejected_tokens_are_attributed() {
        let provider = Arc::new(
            MockPushProvider::new()
                .reject_token("token-3")
                .reject_token("token-777"),
        );
        let dispatcher = BatchDispatcher::new(provider, 4);

        let report = dispatcher.dispatch(&messages(800)).await;

        assert_eq!(report.success_count, 798);
        assert_eq!(report.failure_count, 2);
        assert_eq!(report.failed_tokens(), vec!["token-3", "token-777"]);
        assert!(!report.outcomes[3].success);
        assert!(report.outcomes[3].error.is_some());
    }

    #[test]
    fn test_short_response_marks_missing_as_failed() {
        let batch = messages(3);
        let result = DeliveryBatchResult::from_responses(vec![
            SendResponse::delivered("m1"),
            SendResponse {
                success: false,
                message_id: None,
                error: None,
                retryable: false,
            },
        ]);

        let outcomes = BatchDispatcher::attribute(&batch, result);

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].success);
        assert_eq!(outcomes[1].error.as_deref(), Some(UNKNOWN_ERROR));
        assert_eq!(outcomes[2].error.as_deref(), Some(MISSING_RESPONSE));
        assert!(outcomes[2].retryable);
    }

    #[tokio::test]
    async fn test_retryable_failures_are_not_reported_as_failed_tokens() {
        let provider = Arc::new(
            MockPushProvider::new()
                .reject_token("token-1")
                .throttle_token("token-2"),
        );
        let dispatcher = BatchDispatcher::new(provider, 1);

        let report = dispatcher.dispatch(&messages(3)).await;

        assert_eq!(report.success_count, 1);
        assert_eq!(report.failure_count, 2);
        assert!(!report.outcomes[2].success);
        assert!(report.outcomes[2].retryable);
        assert_eq!(report.failed_tokens(), vec!["token-1"]);
    }
}
