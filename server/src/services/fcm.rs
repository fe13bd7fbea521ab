//! Admin messaging service — topic subscription and message dispatch.
//!
//! DESIGN
//! ======
//! The trait keeps handlers testable against an in-memory double; `FcmHttp`
//! is the production implementation over the FCM legacy HTTP and
//! instance-id batch APIs, authorized with the project server key.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

const DEFAULT_SEND_URL: &str = "https://fcm.googleapis.com/fcm/send";
const DEFAULT_SUBSCRIBE_URL: &str = "https://iid.googleapis.com/iid/v1";

/// Errors produced by admin messaging operations.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    /// The messaging API could not be reached.
    #[error("messaging request failed: {0}")]
    Request(String),

    /// The messaging API returned a non-success status.
    #[error("messaging API error: status {status}: {body}")]
    Api { status: u16, body: String },
}

/// Outcome of a multicast send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub success_count: usize,
    pub failure_count: usize,
}

/// Admin-side messaging operations against subscriber tokens and topics.
#[async_trait]
pub trait TopicMessaging: Send + Sync {
    /// Subscribe a set of device tokens to a named topic.
    async fn subscribe_to_topic(&self, tokens: &[String], topic: &str) -> Result<(), MessagingError>;

    /// Send a notification to every subscriber of a topic.
    async fn send_to_topic(&self, topic: &str, title: &str, body: &str) -> Result<(), MessagingError>;

    /// Send a notification to each token individually.
    async fn send_multicast(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
    ) -> Result<BatchOutcome, MessagingError>;
}

/// [`TopicMessaging`] over the FCM HTTP APIs.
pub struct FcmHttp {
    http: reqwest::Client,
    server_key: String,
    send_url: String,
    subscribe_url: String,
}

impl FcmHttp {
    #[must_use]
    pub fn new(server_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            server_key: server_key.into(),
            send_url: DEFAULT_SEND_URL.to_owned(),
            subscribe_url: DEFAULT_SUBSCRIBE_URL.to_owned(),
        }
    }

    /// Override the API base URLs. Used to point tests at a local stub.
    #[must_use]
    pub fn with_base_urls(mut self, send: impl Into<String>, subscribe: impl Into<String>) -> Self {
        self.send_url = send.into();
        self.subscribe_url = subscribe.into();
        self
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, MessagingError> {
        let response = self
            .http
            .post(url)
            .header("Authorization", format!("key={}", self.server_key))
            .json(body)
            .send()
            .await
            .map_err(|e| MessagingError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MessagingError::Api { status: status.as_u16(), body });
        }
        response
            .json()
            .await
            .map_err(|e| MessagingError::Request(format!("response parse: {e}")))
    }
}

#[async_trait]
impl TopicMessaging for FcmHttp {
    async fn subscribe_to_topic(&self, tokens: &[String], topic: &str) -> Result<(), MessagingError> {
        let url = format!("{}:batchAdd", self.subscribe_url);
        self.post(&url, &subscription_request(tokens, topic)).await?;
        Ok(())
    }

    async fn send_to_topic(&self, topic: &str, title: &str, body: &str) -> Result<(), MessagingError> {
        self.post(&self.send_url, &topic_message(topic, title, body))
            .await?;
        Ok(())
    }

    async fn send_multicast(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
    ) -> Result<BatchOutcome, MessagingError> {
        let response = self
            .post(&self.send_url, &multicast_message(tokens, title, body))
            .await?;
        let report: SendReport = serde_json::from_value(response)
            .map_err(|e| MessagingError::Request(format!("send report parse: {e}")))?;
        Ok(BatchOutcome { success_count: report.success, failure_count: report.failure })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SendReport {
    success: usize,
    failure: usize,
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Batch subscription request for the instance-id API.
#[must_use]
pub fn subscription_request(tokens: &[String], topic: &str) -> Value {
    json!({
        "to": format!("/topics/{topic}"),
        "registration_tokens": tokens,
    })
}

/// Notification message addressed to a topic.
#[must_use]
pub fn topic_message(topic: &str, title: &str, body: &str) -> Value {
    json!({
        "to": format!("/topics/{topic}"),
        "notification": { "title": title, "body": body },
    })
}

/// Notification message addressed to each token individually.
#[must_use]
pub fn multicast_message(tokens: &[String], title: &str, body: &str) -> Value {
    json!({
        "registration_ids": tokens,
        "notification": { "title": title, "body": body },
    })
}

#[cfg(test)]
#[path = "fcm_test.rs"]
mod tests;
