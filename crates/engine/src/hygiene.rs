//! Token hygiene: deactivates registrations whose device tokens the push
//! provider rejected.
//!
//! Tokens are committed in independent chunks of [`TOKEN_CHUNK_SIZE`]. A
//! failed chunk is logged and left alone; the others still commit, and
//! nothing is rolled back. Deactivation is idempotent, so a token missed here
//! is simply caught again after its next failed delivery.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream;

use beacon_common::policy::FailurePolicy;

use crate::error::FanOutError;
use crate::store::WorkerStore;

/// Per-transaction mutation ceiling of the registration store.
pub const TOKEN_CHUNK_SIZE: usize = 500;

/// Annotation written onto deactivated registrations.
pub const INVALID_TOKEN_REASON: &str = "Invalid token";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HygieneReport {
    /// Distinct tokens submitted for deactivation
    pub tokens_submitted: u32,
    /// Tokens in chunks that committed
    pub tokens_deactivated: u32,
    /// Registration rows flipped inactive (a token may own several)
    pub records_updated: u64,
    pub chunks_attempted: u32,
    pub chunks_failed: u32,
}

pub struct TokenHygieneService {
    workers: Arc<dyn WorkerStore>,
    max_in_flight: usize,
    policy: FailurePolicy,
}

impl TokenHygieneService {
    pub fn new(workers: Arc<dyn WorkerStore>, max_in_flight: usize) -> Self {
        Self {
            workers,
            max_in_flight: max_in_flight.max(1),
            policy: FailurePolicy::TOKEN_CHUNK,
        }
    }

    /// Mark every registration holding one of `tokens` inactive.
    ///
    /// Best-effort: waits for every chunk to resolve and never fails.
    pub async fn deactivate(&self, tokens: impl IntoIterator<Item = String>) -> HygieneReport {
        let mut seen = HashSet::new();
        let tokens: Vec<String> = tokens
            .into_iter()
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect();

        let mut report = HygieneReport {
            tokens_submitted: tokens.len() as u32,
            ..Default::default()
        };
        if tokens.is_empty() {
            return report;
        }

        let commits: Vec<_> = tokens
            .chunks(TOKEN_CHUNK_SIZE)
            .enumerate()
            .map(|(index, chunk)| async move {
                (chunk.len(), self.commit_chunk(index, chunk).await)
            })
            .collect();
        let results: Vec<(usize, Option<u64>)> = stream::iter(commits)
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;

        for (size, updated) in results {
            report.chunks_attempted += 1;
            match updated {
                Some(rows) => {
                    report.tokens_deactivated += size as u32;
                    report.records_updated += rows;
                }
                None => report.chunks_failed += 1,
            }
        }

        tracing::info!(
            tokens = report.tokens_submitted,
            chunks = report.chunks_attempted,
            chunks_failed = report.chunks_failed,
            records_updated = report.records_updated,
            "Token hygiene complete"
        );

        report
    }

    async fn commit_chunk(&self, index: usize, chunk: &[String]) -> Option<u64> {
        for attempt in 1..=self.policy.attempts() {
            match self
                .workers
                .deactivate_tokens(chunk, INVALID_TOKEN_REASON)
                .await
            {
                Ok(rows) => {
                    tracing::debug!(
                        chunk = index,
                        tokens = chunk.len(),
                        rows,
                        "Token chunk committed"
                    );
                    return Some(rows);
                }
                Err(e) => {
                    let err = FanOutError::HygieneWrite(e);
                    tracing::error!(
                        chunk = index,
                        tokens = chunk.len(),
                        attempt,
                        kind = err.kind(),
                        error = %err,
                        "Token chunk commit failed"
                    );
                }
            }
        }
        None
    }
}
