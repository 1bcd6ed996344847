//! Analyst API client.
//!
//! Sends the full conversation history plus the selected semantic-model
//! reference to the hosted analyst endpoint and classifies the reply:
//! - HTTP status < 400 → parsed [`AnalystReply`]
//! - HTTP status >= 400 → [`ChatError::AnalystApi`] carrying the status
//!   code, request id, error code, and message from the failure body
//! - unreachable endpoint or timeout → [`ChatError::Transport`]
//! - unparsable body → [`ChatError::MalformedResponse`]
//!
//! There is no retry: a turn either completes within the configured timeout
//! or fails, and the failure is rendered into the conversation.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::AnalystConfig;
use crate::error::ChatError;
use crate::models::{AnalystReply, Turn};

/// Seam between the turn controller and the hosted analyst API.
#[async_trait]
pub trait AnalystApi: Send + Sync {
    /// Send the conversation so far and return the analyst's reply.
    async fn send(&self, messages: &[Turn], model_ref: &str) -> Result<AnalystReply, ChatError>;
}

/// HTTP client for the hosted analyst API.
pub struct AnalystClient {
    http: reqwest::Client,
    endpoint: String,
}

impl AnalystClient {
    /// Build a client with the configured endpoint and request timeout.
    pub fn new(config: &AnalystConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint(),
        })
    }
}

#[async_trait]
impl AnalystApi for AnalystClient {
    async fn send(&self, messages: &[Turn], model_ref: &str) -> Result<AnalystReply, ChatError> {
        let body = serde_json::json!({
            "messages": messages,
            // The API expects a stage-qualified reference with an @ prefix.
            "semantic_model_file": format!("@{}", model_ref),
        });

        tracing::debug!(endpoint = %self.endpoint, turns = messages.len(), "sending analyst request");

        let response = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        let parsed: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| ChatError::MalformedResponse(format!("invalid JSON body: {}", e)))?;

        if status < 400 {
            let reply: AnalystReply = serde_json::from_value(parsed).map_err(|e| {
                ChatError::MalformedResponse(format!("unexpected reply shape: {}", e))
            })?;
            tracing::debug!(request_id = %reply.request_id, "analyst reply received");
            return Ok(reply);
        }

        let failure = classify_failure(status, &parsed);
        tracing::warn!(status, "analyst API returned an error");
        Err(failure)
    }
}

/// Build an [`ChatError::AnalystApi`] from a failure body.
///
/// The body fields are read leniently: a failure reply missing `request_id`,
/// `error_code`, or `message` still produces a renderable error rather than
/// a malformed-response fault.
fn classify_failure(status: u16, body: &serde_json::Value) -> ChatError {
    let field = |name: &str| -> String {
        body.get(name)
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string()
    };

    ChatError::AnalystApi {
        status,
        request_id: field("request_id"),
        error_code: field("error_code"),
        message: field("message"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_failure_reads_body_fields() {
        let body = serde_json::json!({
            "request_id": "req-9",
            "error_code": "invalid_query",
            "message": "could not map question to the semantic model"
        });
        let err = classify_failure(400, &body);
        match err {
            ChatError::AnalystApi {
                status,
                request_id,
                error_code,
                message,
            } => {
                assert_eq!(status, 400);
                assert_eq!(request_id, "req-9");
                assert_eq!(error_code, "invalid_query");
                assert!(message.contains("semantic model"));
            }
            other => panic!("expected AnalystApi, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_failure_tolerates_missing_fields() {
        let err = classify_failure(503, &serde_json::json!({}));
        match err {
            ChatError::AnalystApi {
                status,
                request_id,
                error_code,
                message,
            } => {
                assert_eq!(status, 503);
                assert_eq!(request_id, "unknown");
                assert_eq!(error_code, "unknown");
                assert_eq!(message, "unknown");
            }
            other => panic!("expected AnalystApi, got {:?}", other),
        }
    }
}
