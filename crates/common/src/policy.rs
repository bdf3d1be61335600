//! Failure policies for the fan-out pipeline.
//!
//! Every operation that can fail partially carries an explicit policy instead
//! of relying on where an error happens to be caught. No operation retries
//! today; resilience comes from isolating failures per batch and per chunk.

use serde::Serialize;

/// What happens once an operation has exhausted its attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    /// Log the failure, treat the unit as failed and move on to the next unit.
    IsolateAndContinue,
    /// Record the failure on the originating record, then return it to the caller.
    AnnotateAndPropagate,
    /// Log the failure and report success to the caller.
    LogAndSwallow,
}

/// Retry and failure handling for one kind of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FailurePolicy {
    pub retries: u32,
    pub on_failure: OnFailure,
}

impl FailurePolicy {
    /// One provider call carrying up to 500 recipients.
    pub const PUSH_BATCH: Self = Self {
        retries: 0,
        on_failure: OnFailure::IsolateAndContinue,
    };

    /// One token deactivation transaction carrying up to 500 tokens.
    pub const TOKEN_CHUNK: Self = Self {
        retries: 0,
        on_failure: OnFailure::IsolateAndContinue,
    };

    /// The request-created entry point.
    pub const REQUEST_TRIGGER: Self = Self {
        retries: 0,
        on_failure: OnFailure::AnnotateAndPropagate,
    };

    /// The notification-job entry point.
    pub const QUEUE_DRAIN: Self = Self {
        retries: 0,
        on_failure: OnFailure::LogAndSwallow,
    };

    /// Total number of attempts an operation gets under this policy.
    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_operation_retries() {
        for policy in [
            FailurePolicy::PUSH_BATCH,
            FailurePolicy::TOKEN_CHUNK,
            FailurePolicy::REQUEST_TRIGGER,
            FailurePolicy::QUEUE_DRAIN,
        ] {
            assert_eq!(policy.retries, 0);
            assert_eq!(policy.attempts(), 1);
        }
    }

    #[test]
    fn test_entry_points_differ_in_propagation() {
        assert_eq!(
            FailurePolicy::REQUEST_TRIGGER.on_failure,
            OnFailure::AnnotateAndPropagate
        );
        assert_eq!(
            FailurePolicy::QUEUE_DRAIN.on_failure,
            OnFailure::LogAndSwallow
        );
    }

    #[test]
    fn test_attempts_saturate() {
        let policy = FailurePolicy {
            retries: u32::MAX,
            on_failure: OnFailure::IsolateAndContinue,
        };
        assert_eq!(policy.attempts(), u32::MAX);
    }
}
