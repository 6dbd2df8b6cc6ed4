//! Firebase Cloud Messaging HTTP v1 provider.
//!
//! The v1 API has no multicast endpoint, so a multicast is one `messages:send`
//! request per token, run with bounded concurrency.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use clearperks_common::Config;

use super::{PushErrorCode, PushMessage, PushProvider, TokenOutcome};

const BASE_URL: &str = "https://fcm.googleapis.com/v1";

/// Concurrent sends per multicast.
const MAX_IN_FLIGHT: usize = 32;

pub struct FcmClient {
    client: reqwest::Client,
    send_url: String,
    access_token: String,
}

impl FcmClient {
    pub fn new(project_id: &str, access_token: String) -> Self {
        Self::with_base_url(BASE_URL, project_id, access_token)
    }

    /// Point at another endpoint, e.g. an emulator.
    pub fn with_base_url(base_url: &str, project_id: &str, access_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            send_url: format!(
                "{}/projects/{}/messages:send",
                base_url.trim_end_matches('/'),
                project_id
            ),
            access_token,
        }
    }

    /// `None` unless push is enabled with a project and credential.
    pub fn from_config(config: &Config) -> Option<Self> {
        if !config.push_configured() {
            return None;
        }
        let project_id = config.fcm_project_id.as_deref()?;
        let access_token = config.fcm_access_token.clone()?;
        let base_url = config.fcm_endpoint.as_deref().unwrap_or(BASE_URL);
        Some(Self::with_base_url(base_url, project_id, access_token))
    }

    async fn send_one(&self, message: &PushMessage, token: &str) -> Result<TokenOutcome, reqwest::Error> {
        let payload = json!({
            "message": {
                "token": token,
                "notification": {
                    "title": message.title,
                    "body": message.body,
                },
                "data": message.data,
            }
        });

        let resp = self
            .client
            .post(&self.send_url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(TokenOutcome::Delivered);
        }

        let body = resp.text().await.unwrap_or_default();
        debug!(status = %status, body = %body, "FCM send rejected");
        Ok(parse_error(status, &body))
    }
}

#[async_trait]
impl PushProvider for FcmClient {
    fn name(&self) -> &str {
        "fcm"
    }

    async fn send_multicast(
        &self,
        message: &PushMessage,
        tokens: &[String],
    ) -> anyhow::Result<Vec<TokenOutcome>> {
        let results: Vec<Result<TokenOutcome, reqwest::Error>> = stream::iter(tokens.to_vec())
            .map(|token| async move { self.send_one(message, &token).await })
            .buffered(MAX_IN_FLIGHT)
            .collect()
            .await;

        // Nothing got through at the transport level: the request failed.
        if !results.is_empty() && results.iter().all(Result::is_err) {
            if let Some(Err(e)) = results.into_iter().next() {
                anyhow::bail!("FCM unreachable: {e}");
            }
            anyhow::bail!("FCM unreachable");
        }

        Ok(results
            .into_iter()
            .map(|result| match result {
                Ok(outcome) => outcome,
                Err(e) => TokenOutcome::failed(PushErrorCode::Unavailable, e.to_string()),
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorStatus,
}

#[derive(Debug, Deserialize)]
struct ErrorStatus {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

/// Map a rejected send to an outcome. The FCM-specific `errorCode` detail
/// wins over the generic RPC status.
fn parse_error(status: StatusCode, body: &str) -> TokenOutcome {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        // Without an FCM error body the token itself is not known to be
        // dead, so nothing here maps to an invalid-token code.
        let code = match status {
            StatusCode::TOO_MANY_REQUESTS => PushErrorCode::QuotaExceeded,
            s if s.is_server_error() => PushErrorCode::Unavailable,
            s => PushErrorCode::Other(s.as_u16().to_string()),
        };
        return TokenOutcome::failed(code, format!("HTTP {status}"));
    };

    let detail = envelope
        .error
        .details
        .iter()
        .find_map(|d| d.error_code.as_deref());
    let code = match detail.or(envelope.error.status.as_deref()) {
        Some("UNREGISTERED") | Some("NOT_FOUND") => PushErrorCode::NotRegistered,
        Some("INVALID_ARGUMENT") => PushErrorCode::InvalidArgument,
        Some("SENDER_ID_MISMATCH") | Some("PERMISSION_DENIED") => PushErrorCode::SenderIdMismatch,
        Some("QUOTA_EXCEEDED") | Some("RESOURCE_EXHAUSTED") => PushErrorCode::QuotaExceeded,
        Some("UNAVAILABLE") => PushErrorCode::Unavailable,
        Some("INTERNAL") => PushErrorCode::Internal,
        Some(other) => PushErrorCode::Other(other.to_string()),
        None => PushErrorCode::Other(status.as_u16().to_string()),
    };

    TokenOutcome::failed(code, envelope.error.message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_detail_maps_to_not_registered() {
        let body = r#"{
            "error": {
                "code": 404,
                "message": "Requested entity was not found.",
                "status": "NOT_FOUND",
                "details": [{
                    "@type": "type.googleapis.com/google.firebase.fcm.v1.FcmError",
                    "errorCode": "UNREGISTERED"
                }]
            }
        }"#;

        assert_eq!(
            parse_error(StatusCode::NOT_FOUND, body),
            TokenOutcome::failed(PushErrorCode::NotRegistered, "Requested entity was not found.")
        );
    }

    #[test]
    fn invalid_argument_status_without_details() {
        let body = r#"{"error": {"code": 400, "message": "bad token", "status": "INVALID_ARGUMENT"}}"#;
        let outcome = parse_error(StatusCode::BAD_REQUEST, body);
        assert!(matches!(
            outcome,
            TokenOutcome::Failed { code: PushErrorCode::InvalidArgument, .. }
        ));
    }

    #[test]
    fn quota_errors_keep_the_token() {
        let body = r#"{"error": {"code": 429, "message": "slow down", "status": "RESOURCE_EXHAUSTED",
            "details": [{"errorCode": "QUOTA_EXCEEDED"}]}}"#;
        let TokenOutcome::Failed { code, .. } = parse_error(StatusCode::TOO_MANY_REQUESTS, body) else {
            panic!("expected failure");
        };
        assert_eq!(code, PushErrorCode::QuotaExceeded);
        assert!(!code.is_invalid_token());
    }

    #[test]
    fn undescribed_client_errors_never_prune() {
        for status in [StatusCode::BAD_REQUEST, StatusCode::NOT_FOUND] {
            let TokenOutcome::Failed { code, .. } = parse_error(status, "<html>Bad Request</html>") else {
                panic!("expected failure");
            };
            assert_eq!(code, PushErrorCode::Other(status.as_u16().to_string()));
            assert!(!code.is_invalid_token());
        }
    }

    #[test]
    fn non_json_body_falls_back_to_http_status() {
        let outcome = parse_error(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert!(matches!(
            outcome,
            TokenOutcome::Failed { code: PushErrorCode::Unavailable, .. }
        ));
    }

    #[test]
    fn from_config_requires_credentials() {
        assert!(FcmClient::from_config(&Config::default()).is_none());

        let config = Config {
            fcm_project_id: Some("clearperks-dev".into()),
            fcm_access_token: Some("token".into()),
            fcm_endpoint: Some("http://localhost:9099/v1/".into()),
            ..Config::default()
        };
        let client = FcmClient::from_config(&config).unwrap();
        assert_eq!(
            client.send_url,
            "http://localhost:9099/v1/projects/clearperks-dev/messages:send"
        );
    }
}
