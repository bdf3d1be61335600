//! Firebase Cloud Messaging HTTP v1 client.
//!
//! Authenticates with a service-account assertion (RS256 JWT) exchanged for a
//! short-lived OAuth access token, cached until shortly before it expires.
//! HTTP v1 has no multicast endpoint, so a batch is a bounded set of
//! concurrent single sends sharing one access token.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use beacon_common::config::PushConfig;
use beacon_common::types::{DeliveryBatchResult, SendResponse};

use crate::dispatcher::PUSH_BATCH_SIZE;
use crate::error::PushError;
use crate::payload::PushMessage;
use crate::provider::PushProvider;

const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh the access token this long before the provider says it expires.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Claims of the service-account assertion.
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    message: &'a PushMessage,
}

#[derive(Debug, Deserialize)]
struct SendResponseBody {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Why a single send failed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SendFailure {
    /// The provider answered and rejected this recipient.
    Recipient { status: u16, message: String },
    /// The failure says nothing about the recipient (network, auth, quota, outage).
    Transport(String),
}

impl SendFailure {
    fn classify(status: StatusCode, message: String) -> Self {
        if status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
            || status == StatusCode::TOO_MANY_REQUESTS
            || status.is_server_error()
        {
            SendFailure::Transport(format!("{}: {}", status, message))
        } else {
            SendFailure::Recipient {
                status: status.as_u16(),
                message,
            }
        }
    }

    fn message(&self) -> &str {
        match self {
            SendFailure::Recipient { message, .. } => message,
            SendFailure::Transport(message) => message,
        }
    }
}

/// FCM HTTP v1 push provider.
pub struct FcmClient {
    http: reqwest::Client,
    config: PushConfig,
    token: Mutex<Option<AccessToken>>,
}

impl FcmClient {
    pub fn new(config: PushConfig) -> Result<Self, PushError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("beacon/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        tracing::info!(project_id = %config.project_id, "FCM client configured");

        Ok(Self {
            http,
            config,
            token: Mutex::new(None),
        })
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.config.api_base.trim_end_matches('/'),
            self.config.project_id
        )
    }

    /// Return a valid access token, minting a new one when the cached token
    /// is missing or about to expire.
    async fn access_token(&self) -> Result<String, PushError> {
        let mut cached = self.token.lock().await;
        let refresh_at = Utc::now() + chrono::Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        if let Some(token) = cached.as_ref()
            && token.expires_at > refresh_at
        {
            return Ok(token.value.clone());
        }

        let token = self.mint_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn mint_token(&self) -> Result<AccessToken, PushError> {
        let now = Utc::now();
        let claims = AssertionClaims {
            iss: &self.config.client_email,
            scope: FCM_SCOPE,
            aud: &self.config.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };

        let key = EncodingKey::from_rsa_pem(self.config.private_key.as_bytes())
            .map_err(|e| PushError::Auth(format!("Invalid service account key: {}", e)))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| PushError::Auth(format!("Failed to sign assertion: {}", e)))?;

        let response = self
            .http
            .post(&self.config.token_uri)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Auth(format!(
                "Token exchange failed ({}): {}",
                status, body
            )));
        }

        let token: TokenResponse = response.json().await?;
        tracing::debug!(expires_in = token.expires_in, "Minted FCM access token");

        Ok(AccessToken {
            value: token.access_token,
            expires_at: now + chrono::Duration::seconds(token.expires_in),
        })
    }

    async fn post_message(
        &self,
        access_token: &str,
        message: &PushMessage,
    ) -> Result<String, SendFailure> {
        let response = self
            .http
            .post(self.send_url())
            .bearer_auth(access_token)
            .json(&SendRequest { message })
            .send()
            .await
            .map_err(|e| SendFailure::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let body: SendResponseBody = response
                .json()
                .await
                .map_err(|e| SendFailure::Transport(e.to_string()))?;
            return Ok(body.name);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&text)
            .map(|envelope| envelope.error.message)
            .unwrap_or(text);
        Err(SendFailure::classify(status, message))
    }
}

#[async_trait]
impl PushProvider for FcmClient {
    async fn send(&self, message: &PushMessage) -> Result<String, PushError> {
        let access_token = self.access_token().await?;
        self.post_message(&access_token, message)
            .await
            .map_err(|failure| match failure {
                SendFailure::Recipient { status, message } => {
                    PushError::Rejected { status, message }
                }
                SendFailure::Transport(message) => PushError::Unavailable(message),
            })
    }

    async fn send_batch(&self, messages: &[PushMessage]) -> Result<DeliveryBatchResult, PushError> {
        if messages.len() > PUSH_BATCH_SIZE {
            return Err(PushError::BatchTooLarge {
                size: messages.len(),
                max: PUSH_BATCH_SIZE,
            });
        }

        let access_token = self.access_token().await?;
        let sends: Vec<_> = messages
            .iter()
            .map(|message| self.post_message(&access_token, message))
            .collect();
        let results: Vec<Result<String, SendFailure>> = stream::iter(sends)
            .buffered(self.config.max_in_flight_sends.max(1))
            .collect()
            .await;

        batch_result(results)
    }
}

/// Fold per-message results into a batch result.
///
/// A non-empty batch where every send failed for a non-recipient reason is
/// reported as a batch-level failure. In a mixed batch those sends come back
/// as retryable responses, so no token gets blamed for them either.
fn batch_result(
    results: Vec<Result<String, SendFailure>>,
) -> Result<DeliveryBatchResult, PushError> {
    let all_transport = !results.is_empty()
        && results
            .iter()
            .all(|r| matches!(r, Err(SendFailure::Transport(_))));

    if all_transport {
        let reason = results
            .iter()
            .find_map(|r| r.as_ref().err())
            .map(|f| f.message().to_string())
            .unwrap_or_default();
        return Err(PushError::Unavailable(reason));
    }

    let responses = results
        .into_iter()
        .map(|result| match result {
            Ok(name) => SendResponse::delivered(name),
            Err(SendFailure::Recipient { message, .. }) => SendResponse::failed(message),
            Err(SendFailure::Transport(message)) => SendResponse::unavailable(message),
        })
        .collect();

    Ok(DeliveryBatchResult::from_responses(responses))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::dispatcher::{BatchDispatcher, DispatchReport};
    use crate::payload::{NotificationKind, PayloadBuilder};

    #[test]
    fn test_classify_recipient_errors() {
        let failure = SendFailure::classify(
            StatusCode::NOT_FOUND,
            "Requested entity was not found.".into(),
        );
        assert_eq!(
            failure,
            SendFailure::Recipient {
                status: 404,
                message: "Requested entity was not found.".into()
            }
        );
        assert!(matches!(
            SendFailure::classify(StatusCode::BAD_REQUEST, "bad token".into()),
            SendFailure::Recipient { status: 400, .. }
        ));
    }

    #[test]
    fn test_classify_transport_errors() {
        for status in [
            StatusCode::UNAUTHORIZED,
            StatusCode::FORBIDDEN,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            assert!(matches!(
                SendFailure::classify(status, "x".into()),
                SendFailure::Transport(_)
            ));
        }
    }

    #[test]
    fn test_batch_all_transport_failures_is_batch_error() {
        let results = vec![
            Err(SendFailure::Transport("connection refused".into())),
            Err(SendFailure::Transport("connection refused".into())),
        ];
        let err = batch_result(results).unwrap_err();
        assert!(matches!(err, PushError::Unavailable(ref m) if m == "connection refused"));
    }

    #[test]
    fn test_batch_mixed_results_are_per_recipient() {
        let results = vec![
            Ok("projects/p/messages/1".to_string()),
            Err(SendFailure::Recipient {
                status: 404,
                message: "unregistered".into(),
            }),
            Err(SendFailure::Transport("timeout".into())),
        ];
        let batch = batch_result(results).unwrap();
        assert_eq!(batch.success_count, 1);
        assert_eq!(batch.failure_count, 2);
        assert_eq!(batch.responses[0].message_id.as_deref(), Some("projects/p/messages/1"));
        assert_eq!(batch.responses[1].error.as_deref(), Some("unregistered"));
        assert!(!batch.responses[1].retryable);
        assert_eq!(batch.responses[2].error.as_deref(), Some("timeout"));
        assert!(batch.responses[2].retryable);
    }

    #[test]
    fn test_transient_failure_in_mixed_batch_keeps_token_active() {
        let outage = SendFailure::classify(StatusCode::SERVICE_UNAVAILABLE, "backend down".into());
        let batch = batch_result(vec![
            Ok("projects/p/messages/1".to_string()),
            Err(outage),
        ])
        .unwrap();
        let payload = PayloadBuilder::build(
            NotificationKind::Broadcast,
            None,
            None,
            BTreeMap::new(),
        );
        let messages = vec![
            PushMessage::new("healthy-a", payload.clone()),
            PushMessage::new("healthy-b", payload),
        ];

        let outcomes = BatchDispatcher::attribute(&messages, batch);
        let report = DispatchReport {
            outcomes,
            ..Default::default()
        };

        assert!(!report.outcomes[1].success);
        assert!(report.failed_tokens().is_empty());
    }

    #[test]
    fn test_empty_batch_is_empty_result() {
        let batch = batch_result(Vec::new()).unwrap();
        assert_eq!(batch.success_count, 0);
        assert!(batch.responses.is_empty());
    }

    #[test]
    fn test_send_request_body_shape() {
        let payload = PayloadBuilder::build(
            NotificationKind::Broadcast,
            Some("T"),
            Some("B"),
            BTreeMap::new(),
        );
        let message = PushMessage::new("device-token", payload);
        let body = serde_json::to_value(SendRequest { message: &message }).unwrap();
        assert_eq!(body["message"]["token"], "device-token");
        assert_eq!(body["message"]["notification"]["title"], "T");
        assert_eq!(body["message"]["data"]["click_action"], "FLUTTER_NOTIFICATION_CLICK");
    }

    #[test]
    fn test_send_url_trims_trailing_slash() {
        let client = FcmClient::new(PushConfig {
            project_id: "demo".into(),
            client_email: "svc@demo.iam.gserviceaccount.com".into(),
            private_key: String::new(),
            api_base: "https://fcm.example.test/".into(),
            token_uri: "https://oauth.example.test/token".into(),
            max_in_flight_batches: 1,
            max_in_flight_sends: 1,
        })
        .unwrap();
        assert_eq!(
            client.send_url(),
            "https://fcm.example.test/v1/projects/demo/messages:send"
        );
    }
}
