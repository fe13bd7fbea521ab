//! Messaging provider contract — device tokens, incoming messages, topics.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Errors produced by messaging operations.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    /// The messaging backend could not be reached.
    #[error("messaging request failed: {0}")]
    Request(String),

    /// The messaging backend returned a non-success status.
    #[error("messaging response error: status {status}: {body}")]
    Response { status: u16, body: String },
}

/// An incoming push message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub title: Option<String>,
    pub body: Option<String>,
}

/// Subscription to incoming messages. Dropping it releases the
/// subscription.
pub struct MessageEvents {
    receiver: mpsc::Receiver<MessagePayload>,
}

impl MessageEvents {
    #[must_use]
    pub fn new(receiver: mpsc::Receiver<MessagePayload>) -> Self {
        Self { receiver }
    }

    /// Wait for the next message. `None` once the provider side has gone
    /// away.
    pub async fn next(&mut self) -> Option<MessagePayload> {
        self.receiver.recv().await
    }
}

/// The push messaging subsystem. Device tokens have a lifecycle unrelated
/// to identities and may be reissued at any time.
#[async_trait]
pub trait Messaging: Send + Sync {
    /// Obtain the device token for this client instance. `Ok(None)` when no
    /// token can be issued (e.g. permission not granted).
    async fn request_token(&self, vapid_key: &str) -> Result<Option<String>, MessagingError>;

    /// Subscribe to messages delivered while the app is in the foreground.
    fn messages(&self) -> MessageEvents;

    /// Subscribe a set of device tokens to a named topic.
    async fn subscribe_to_topic(&self, tokens: &[String], topic: &str) -> Result<(), MessagingError>;
}
