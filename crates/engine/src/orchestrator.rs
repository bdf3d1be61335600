//! Fan-out orchestration for the two trigger entry points.
//!
//! Request-created:
//! 1. Validate the request has a location and a service (drop it otherwise)
//! 2. Find nearby active workers through the [`GeoIndex`]
//! 3. Build one personalised payload per worker and dispatch them
//! 4. Deactivate tokens the provider rejected
//! 5. Annotate the request with the outcome, exactly once
//!
//! Queue-drain sends one shared payload to the job's token list, runs token
//! hygiene and deletes the job no matter what happened along the way.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use beacon_common::policy::{FailurePolicy, OnFailure};
use beacon_common::types::{
    DispatchFailure, DispatchSummary, GeoPoint, NotificationJob, ServiceRequest,
};
use beacon_notifier::payload::DEFAULT_BODY;
use beacon_notifier::{
    BatchDispatcher, DispatchReport, NotificationKind, PayloadBuilder, PushMessage,
};

use crate::distance::format_distance;
use crate::error::FanOutError;
use crate::geo_index::{GeoIndex, NearbyWorker};
use crate::hygiene::{HygieneReport, TokenHygieneService};
use crate::store::{JobStore, RequestStore};

pub struct FanOutOrchestrator {
    geo_index: GeoIndex,
    dispatcher: BatchDispatcher,
    hygiene: TokenHygieneService,
    requests: Arc<dyn RequestStore>,
    jobs: Arc<dyn JobStore>,
}

impl FanOutOrchestrator {
    pub fn new(
        geo_index: GeoIndex,
        dispatcher: BatchDispatcher,
        hygiene: TokenHygieneService,
        requests: Arc<dyn RequestStore>,
        jobs: Arc<dyn JobStore>,
    ) -> Self {
        Self {
            geo_index,
            dispatcher,
            hygiene,
            requests,
            jobs,
        }
    }

    /// Load a request by id and run [`Self::on_request_created`] on it.
    ///
    /// Unknown ids are logged and ignored.
    pub async fn on_request_id(&self, id: Uuid) -> Result<Option<DispatchSummary>, FanOutError> {
        match self.requests.get(id).await? {
            Some(request) => self.on_request_created(&request).await,
            None => {
                tracing::warn!(request_id = %id, "Request not found, skipping");
                Ok(None)
            }
        }
    }

    /// Request-created entry point.
    ///
    /// Returns `Ok(None)` when the request is dropped for missing fields, in
    /// which case nothing is queried or written. Pipeline errors are annotated
    /// onto the request and then returned.
    pub async fn on_request_created(
        &self,
        request: &ServiceRequest,
    ) -> Result<Option<DispatchSummary>, FanOutError> {
        let (Some(location), Some(service)) = (request.location(), request.service()) else {
            let err = FanOutError::Validation("request has no valid location or service".into());
            tracing::warn!(
                request_id = %request.id,
                kind = err.kind(),
                error = %err,
                "Dropping request"
            );
            return Ok(None);
        };

        match self.fan_out_request(request, location, service).await {
            Ok(summary) => {
                // At most one annotation per request; a failed result write
                // is not followed by an error write.
                self.requests
                    .record_dispatch_result(request.id, &summary)
                    .await?;

                tracing::info!(
                    request_id = %request.id,
                    matched = summary.total_matched,
                    sent = summary.total_sent,
                    failed = summary.total_failed,
                    undelivered = summary.total_undelivered,
                    "Request dispatched"
                );
                Ok(Some(summary))
            }
            Err(err) => Err(self.settle_request_failure(request.id, err).await),
        }
    }

    async fn fan_out_request(
        &self,
        request: &ServiceRequest,
        location: GeoPoint,
        service: &str,
    ) -> Result<DispatchSummary, FanOutError> {
        let radius_km = request.radius_km();
        let workers = self
            .geo_index
            .find_nearby(location, radius_km, service)
            .await?;

        tracing::info!(
            request_id = %request.id,
            service,
            radius_km,
            matched = workers.len(),
            "Matched nearby workers"
        );

        let messages: Vec<PushMessage> = workers
            .iter()
            .map(|worker| Self::request_message(request, service, worker))
            .collect();

        let report = self.dispatcher.dispatch(&messages).await;
        let hygiene = self.hygiene.deactivate(report.failed_tokens()).await;

        Ok(summarize(workers.len(), &report, &hygiene))
    }

    fn request_message(
        request: &ServiceRequest,
        service: &str,
        worker: &NearbyWorker,
    ) -> PushMessage {
        let title = format!("New {} request", service);
        let description = request
            .description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(DEFAULT_BODY);
        let body = format!("{} ({} away)", description, format_distance(worker.distance_km));

        let data = BTreeMap::from([
            ("request_id".to_string(), request.id.to_string()),
            ("service".to_string(), service.to_string()),
            ("distance_km".to_string(), format!("{:.2}", worker.distance_km)),
        ]);

        let payload =
            PayloadBuilder::build(NotificationKind::Individual, Some(&title), Some(&body), data);
        PushMessage::new(worker.location.token.clone(), payload)
    }

    async fn settle_request_failure(&self, request_id: Uuid, err: FanOutError) -> FanOutError {
        tracing::error!(
            request_id = %request_id,
            kind = err.kind(),
            error = %err,
            "Request fan-out failed"
        );

        if FailurePolicy::REQUEST_TRIGGER.on_failure == OnFailure::AnnotateAndPropagate {
            let failure = DispatchFailure {
                kind: err.kind().to_string(),
                message: err.to_string(),
                failed_at: Utc::now(),
            };
            if let Err(e) = self.requests.record_dispatch_error(request_id, &failure).await {
                tracing::error!(
                    request_id = %request_id,
                    error = %e,
                    "Failed to annotate request error"
                );
            }
        }

        err
    }

    /// Queue-drain entry point.
    ///
    /// Never fails: errors are logged and the job is gone afterwards either
    /// way. Returns `None` when nothing was dispatched.
    pub async fn drain_job(&self, job: &NotificationJob) -> Option<DispatchSummary> {
        let summary = self.dispatch_job(job).await;

        if let Err(e) = self.jobs.delete(job.id).await {
            let err = FanOutError::from(e);
            tracing::error!(
                job_id = %job.id,
                kind = err.kind(),
                error = %err,
                policy = ?FailurePolicy::QUEUE_DRAIN.on_failure,
                "Failed to delete job"
            );
        }

        summary
    }

    async fn dispatch_job(&self, job: &NotificationJob) -> Option<DispatchSummary> {
        let tokens: Vec<&str> = job
            .tokens
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();

        if tokens.is_empty() {
            tracing::info!(job_id = %job.id, "Job has no tokens, deleting");
            return None;
        }

        let payload = PayloadBuilder::build(
            NotificationKind::Broadcast,
            job.title.as_deref(),
            job.body.as_deref(),
            PayloadBuilder::string_data(&job.data),
        );
        let messages: Vec<PushMessage> = tokens
            .iter()
            .map(|token| PushMessage::new(*token, payload.clone()))
            .collect();

        let report = self.dispatcher.dispatch(&messages).await;
        let hygiene = self.hygiene.deactivate(report.failed_tokens()).await;
        let summary = summarize(messages.len(), &report, &hygiene);

        tracing::info!(
            job_id = %job.id,
            recipients = summary.total_matched,
            sent = summary.total_sent,
            failed = summary.total_failed,
            undelivered = summary.total_undelivered,
            deactivated = summary.tokens_deactivated,
            "Job drained"
        );
        Some(summary)
    }
}

fn summarize(matched: usize, report: &DispatchReport, hygiene: &HygieneReport) -> DispatchSummary {
    DispatchSummary {
        total_matched: matched as u32,
        total_sent: report.success_count,
        total_failed: report.failure_count,
        total_undelivered: report.undelivered_count,
        tokens_deactivated: hygiene.tokens_deactivated,
        dispatched_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_common::types::WorkerLocation;

    fn nearby(token: &str, distance_km: f64) -> NearbyWorker {
        NearbyWorker {
            location: WorkerLocation {
                worker_id: Uuid::new_v4(),
                latitude: 37.0,
                longitude: -122.0,
                geohash: "9q9".to_string(),
                service: "plumbing".to_string(),
                token: token.to_string(),
                active: true,
                last_error: None,
                last_updated: Utc::now(),
            },
            distance_km,
        }
    }

    fn request(description: Option<&str>) -> ServiceRequest {
        ServiceRequest {
            id: Uuid::new_v4(),
            latitude: Some(37.0),
            longitude: Some(-122.0),
            service: Some("plumbing".to_string()),
            radius_km: None,
            description: description.map(String::from),
            image_urls: Vec::new(),
            dispatch_result: None,
            dispatch_error: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_request_message_is_personalised() {
        let req = request(Some("Leaking sink"));
        let msg = FanOutOrchestrator::request_message(&req, "plumbing", &nearby("tok", 2.346));

        assert_eq!(msg.token, "tok");
        assert_eq!(msg.payload.notification.title, "New plumbing request");
        assert_eq!(msg.payload.notification.body, "Leaking sink (2.3 km away)");
        assert_eq!(msg.payload.data["request_id"], req.id.to_string());
        assert_eq!(msg.payload.data["service"], "plumbing");
        assert_eq!(msg.payload.data["distance_km"], "2.35");
        assert_eq!(msg.payload.apns.payload.aps.badge, Some(1));
    }

    #[test]
    fn test_request_message_without_description() {
        let worker = nearby("t", 0.5);
        let msg = FanOutOrchestrator::request_message(&request(None), "plumbing", &worker);
        assert_eq!(
            msg.payload.notification.body,
            format!("{} (500 m away)", DEFAULT_BODY)
        );
    }

    #[test]
    fn test_summarize_counts() {
        let report = DispatchReport {
            success_count: 3,
            failure_count: 2,
            undelivered_count: 500,
            ..Default::default()
        };
        let hygiene = HygieneReport {
            tokens_deactivated: 2,
            ..Default::default()
        };

        let summary = summarize(505, &report, &hygiene);

        assert_eq!(summary.total_matched, 505);
        assert_eq!(summary.total_sent, 3);
        assert_eq!(summary.total_failed, 2);
        assert_eq!(summary.total_undelivered, 500);
        assert_eq!(summary.tokens_deactivated, 2);
    }
}
