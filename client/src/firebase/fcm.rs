//! FCM adapter for [`Messaging`].
//!
//! DESIGN
//! ======
//! Token issuance follows the web SDK's two-step dance: register an
//! installation with the Installations API, then exchange the installation
//! auth token plus the page's web-push subscription for a registration
//! token. The push subscription itself belongs to the platform layer and is
//! injected as configuration; without one, `request_token` reports that no
//! token is available rather than failing.
//!
//! Topic subscription uses the instance-id batch API, which requires a
//! privileged server key. Browser deployments route topic subscription
//! through the dispatch service instead and leave the key unset here.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::debug;

use crate::firebase::config::FirebaseConfig;
use crate::messaging::{MessageEvents, MessagePayload, Messaging, MessagingError};

const DEFAULT_INSTALLATIONS_URL: &str = "https://firebaseinstallations.googleapis.com/v1";
const DEFAULT_REGISTRATIONS_URL: &str = "https://fcmregistrations.googleapis.com/v1";
const DEFAULT_SUBSCRIPTIONS_URL: &str = "https://iid.googleapis.com/iid/v1";

const MESSAGE_CHANNEL_CAPACITY: usize = 16;

/// Web-push subscription details owned by the platform layer.
#[derive(Debug, Clone)]
pub struct WebPushSubscription {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

/// [`Messaging`] over the FCM HTTP APIs.
pub struct FcmMessaging {
    http: reqwest::Client,
    api_key: String,
    project_id: String,
    app_id: Option<String>,
    installations_url: String,
    registrations_url: String,
    subscriptions_url: String,
    server_key: Option<String>,
    push: Option<WebPushSubscription>,
    listeners: Mutex<Vec<mpsc::Sender<MessagePayload>>>,
}

impl FcmMessaging {
    #[must_use]
    pub fn new(config: &FirebaseConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            project_id: config.project_id.clone(),
            app_id: config.app_id.clone(),
            installations_url: DEFAULT_INSTALLATIONS_URL.to_owned(),
            registrations_url: DEFAULT_REGISTRATIONS_URL.to_owned(),
            subscriptions_url: DEFAULT_SUBSCRIPTIONS_URL.to_owned(),
            server_key: None,
            push: None,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Install the page's web-push subscription. Token issuance is disabled
    /// without one.
    #[must_use]
    pub fn with_push_subscription(mut self, push: WebPushSubscription) -> Self {
        self.push = Some(push);
        self
    }

    /// Install a privileged server key enabling direct topic subscription.
    #[must_use]
    pub fn with_server_key(mut self, server_key: impl Into<String>) -> Self {
        self.server_key = Some(server_key.into());
        self
    }

    /// Override the API base URLs. Used to point tests at a local stub.
    #[must_use]
    pub fn with_base_urls(
        mut self,
        installations: impl Into<String>,
        registrations: impl Into<String>,
        subscriptions: impl Into<String>,
    ) -> Self {
        self.installations_url = installations.into();
        self.registrations_url = registrations.into();
        self.subscriptions_url = subscriptions.into();
        self
    }

    /// Hand an incoming push payload to every active message subscription.
    /// Called by the platform's push transport bridge.
    pub fn deliver(&self, payload: &MessagePayload) {
        let mut listeners = self.listeners.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        listeners.retain(|sender| sender.try_send(payload.clone()).is_ok());
    }

    async fn create_installation(&self) -> Result<String, MessagingError> {
        let app_id = self.app_id.clone().ok_or_else(|| {
            MessagingError::Request("no app id configured for installation registration".to_owned())
        })?;
        let url = format!("{}/projects/{}/installations", self.installations_url, self.project_id);
        let body = json!({ "fid": "", "appId": app_id, "sdkVersion": "w:0.6.4" });
        let response: InstallationResponse = check(
            self.http
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .await,
        )
        .await?;
        Ok(response.auth_token.token)
    }

    async fn register_token(
        &self,
        installation_auth: &str,
        push: &WebPushSubscription,
        vapid_key: &str,
    ) -> Result<String, MessagingError> {
        let url = format!("{}/projects/{}/registrations", self.registrations_url, self.project_id);
        let body = json!({
            "web": {
                "endpoint": push.endpoint,
                "p256dh": push.p256dh,
                "auth": push.auth,
                "applicationPubKey": vapid_key,
            }
        });
        let response: RegistrationResponse = check(
            self.http
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .header("x-goog-firebase-installations-auth", installation_auth)
                .json(&body)
                .send()
                .await,
        )
        .await?;
        Ok(response.token)
    }
}

#[async_trait]
impl Messaging for FcmMessaging {
    async fn request_token(&self, vapid_key: &str) -> Result<Option<String>, MessagingError> {
        let Some(push) = &self.push else {
            debug!("no web-push subscription configured; no device token available");
            return Ok(None);
        };
        let installation_auth = self.create_installation().await?;
        let token = self.register_token(&installation_auth, push, vapid_key).await?;
        Ok(Some(token))
    }

    fn messages(&self) -> MessageEvents {
        let (sender, receiver) = mpsc::channel(MESSAGE_CHANNEL_CAPACITY);
        let mut listeners = self.listeners.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        listeners.push(sender);
        MessageEvents::new(receiver)
    }

    async fn subscribe_to_topic(&self, tokens: &[String], topic: &str) -> Result<(), MessagingError> {
        let Some(server_key) = &self.server_key else {
            return Err(MessagingError::Request(
                "no privileged messaging key configured for topic subscription".to_owned(),
            ));
        };
        let url = format!("{}:batchAdd", self.subscriptions_url);
        let body = subscription_body(tokens, topic);
        check::<Value>(
            self.http
                .post(&url)
                .header("Authorization", format!("key={server_key}"))
                .json(&body)
                .send()
                .await,
        )
        .await?;
        Ok(())
    }
}

/// Fold a reqwest result into a decoded body or a [`MessagingError`].
async fn check<T: serde::de::DeserializeOwned>(
    result: Result<reqwest::Response, reqwest::Error>,
) -> Result<T, MessagingError> {
    let response = result.map_err(|e| MessagingError::Request(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(MessagingError::Response { status: status.as_u16(), body });
    }
    response
        .json()
        .await
        .map_err(|e| MessagingError::Request(format!("response parse: {e}")))
}

/// Batch subscription request body for the instance-id API.
fn subscription_body(tokens: &[String], topic: &str) -> Value {
    json!({
        "to": format!("/topics/{topic}"),
        "registration_tokens": tokens,
    })
}

#[derive(Debug, Deserialize)]
struct InstallationResponse {
    #[serde(rename = "authToken")]
    auth_token: InstallationAuthToken,
}

#[derive(Debug, Deserialize)]
struct InstallationAuthToken {
    token: String,
}

#[derive(Debug, Deserialize)]
struct RegistrationResponse {
    token: String,
}

#[cfg(test)]
#[path = "fcm_test.rs"]
mod tests;
