//! Identity Toolkit REST adapter for [`IdentityProvider`].
//!
//! DESIGN
//! ======
//! Every operation is one POST to an `accounts:*` method keyed by the web
//! API key. Rejections come back as an `error.message` reason string
//! (`EMAIL_NOT_FOUND`, `INVALID_PASSWORD`, ...) which is mapped onto the
//! canonical `auth/...` codes the credential layer knows. Social sign-in
//! needs an OAuth credential from the platform's interactive flow; that
//! flow is injected as an [`IdpTokenSource`] — this adapter only performs
//! the token exchange.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::{Mutex, watch};

use crate::firebase::config::FirebaseConfig;
use crate::identity::{
    AuthError, Credential, Identity, IdentityEvents, IdentityProvider, ProviderKind,
};

const DEFAULT_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// OAuth credential obtained from a social provider's interactive flow.
#[derive(Debug, Clone, Default)]
pub struct IdpToken {
    pub id_token: Option<String>,
    pub access_token: Option<String>,
}

/// Source of IdP OAuth credentials. The UI shell owns the actual popup or
/// redirect; this trait hands the resulting credential back for exchange.
/// A dismissed or blocked flow surfaces as [`AuthError::Rejected`] with the
/// matching `auth/popup-*` code.
#[async_trait]
pub trait IdpTokenSource: Send + Sync {
    async fn obtain(&self, kind: ProviderKind) -> Result<IdpToken, AuthError>;
}

/// [`IdentityProvider`] over the Identity Toolkit REST API.
pub struct FirebaseAuthProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    idp_tokens: Option<Arc<dyn IdpTokenSource>>,
    current: watch::Sender<Option<Identity>>,
    /// ID token of the signed-in account, needed by authorized methods
    /// (profile update, credential linking).
    id_token: Mutex<Option<String>>,
}

impl FirebaseAuthProvider {
    #[must_use]
    pub fn new(config: &FirebaseConfig) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_key: config.api_key.clone(),
            idp_tokens: None,
            current,
            id_token: Mutex::new(None),
        }
    }

    /// Override the API base URL. Used to point tests at a local stub.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Install the interactive OAuth credential source. Without one, social
    /// sign-in is rejected as not enabled.
    #[must_use]
    pub fn with_idp_tokens(mut self, source: Arc<dyn IdpTokenSource>) -> Self {
        self.idp_tokens = Some(source);
        self
    }

    async fn call(&self, method: &str, body: Value) -> Result<AccountResponse, AuthError> {
        let url = format!("{}/accounts:{}", self.base_url, method);
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| AuthError::Fault(format!("identity API response parse: {e}")));
        }

        let body_text = response.text().await.unwrap_or_default();
        let reason = serde_json::from_str::<Value>(&body_text)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned)
            });
        match reason {
            Some(reason) => Err(AuthError::rejected(rejection_code(&reason))),
            None => Err(AuthError::Fault(format!("identity API {status}: {body_text}"))),
        }
    }

    /// Record the signed-in account and publish the identity change.
    async fn complete_sign_in(&self, identity: Identity, id_token: Option<String>) -> Identity {
        if id_token.is_some() {
            *self.id_token.lock().await = id_token;
        }
        self.current.send_replace(Some(identity.clone()));
        identity
    }

    async fn require_id_token(&self) -> Result<String, AuthError> {
        self.id_token
            .lock()
            .await
            .clone()
            .ok_or_else(|| AuthError::Fault("no identity is signed in".to_owned()))
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuthProvider {
    async fn sign_in_with_email(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let response = self
            .call(
                "signInWithPassword",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        let identity = response.to_identity("password");
        Ok(self.complete_sign_in(identity, response.id_token).await)
    }

    async fn create_identity(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let response = self
            .call(
                "signUp",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        let identity = response.to_identity("password");
        Ok(self.complete_sign_in(identity, response.id_token).await)
    }

    async fn sign_in_with_popup(&self, kind: ProviderKind) -> Result<Identity, AuthError> {
        let Some(source) = &self.idp_tokens else {
            return Err(AuthError::rejected("auth/operation-not-allowed"));
        };
        let token = source.obtain(kind).await?;
        let response = self
            .call(
                "signInWithIdp",
                json!({
                    "postBody": idp_post_body(&token, kind),
                    "requestUri": "http://localhost",
                    "returnSecureToken": true,
                    "returnIdpCredential": true,
                }),
            )
            .await?;
        let identity = response.to_identity(kind.provider_id());
        Ok(self.complete_sign_in(identity, response.id_token).await)
    }

    async fn link_credential(&self, credential: Credential) -> Result<Identity, AuthError> {
        let id_token = self.require_id_token().await?;
        let (response, linked_provider) = match credential {
            Credential::EmailPassword { email, password } => (
                self.call(
                    "update",
                    json!({
                        "idToken": id_token,
                        "email": email,
                        "password": password,
                        "returnSecureToken": true,
                    }),
                )
                .await?,
                "password",
            ),
            Credential::Phone { verification_id, verification_code } => (
                self.call(
                    "signInWithPhoneNumber",
                    json!({
                        "idToken": id_token,
                        "sessionInfo": verification_id,
                        "code": verification_code,
                    }),
                )
                .await?,
                "phone",
            ),
        };

        let mut identity = response.to_identity(linked_provider);
        if let Some(existing) = self.current.borrow().clone() {
            // Linking extends the provider set; it never replaces it.
            for provider_id in existing.provider_ids {
                if !identity.provider_ids.contains(&provider_id) {
                    identity.provider_ids.push(provider_id);
                }
            }
            identity.display_name = identity.display_name.or(existing.display_name);
            identity.photo_url = identity.photo_url.or(existing.photo_url);
        }
        Ok(self.complete_sign_in(identity, response.id_token).await)
    }

    async fn update_display_name(&self, display_name: &str) -> Result<Identity, AuthError> {
        let id_token = self.require_id_token().await?;
        let response = self
            .call(
                "update",
                json!({
                    "idToken": id_token,
                    "displayName": display_name,
                    "returnSecureToken": true,
                }),
            )
            .await?;

        let mut identity = self
            .current
            .borrow()
            .clone()
            .unwrap_or_else(|| response.to_identity("password"));
        identity.display_name = Some(display_name.to_owned());
        Ok(self.complete_sign_in(identity, response.id_token).await)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        *self.id_token.lock().await = None;
        self.current.send_replace(None);
        Ok(())
    }

    fn current_identity(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    fn subscribe(&self) -> IdentityEvents {
        IdentityEvents::new(self.current.subscribe())
    }
}

// =============================================================================
// WIRE TYPES AND MAPPING
// =============================================================================

/// The subset of `accounts:*` response fields this adapter reads.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AccountResponse {
    local_id: String,
    id_token: Option<String>,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
    provider_id: Option<String>,
}

impl AccountResponse {
    fn to_identity(&self, fallback_provider_id: &str) -> Identity {
        let provider_id = self
            .provider_id
            .clone()
            .unwrap_or_else(|| fallback_provider_id.to_owned());
        Identity {
            uid: self.local_id.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
            provider_ids: vec![provider_id],
        }
    }
}

/// `postBody` for the `signInWithIdp` exchange.
fn idp_post_body(token: &IdpToken, kind: ProviderKind) -> String {
    let mut parts = Vec::new();
    if let Some(id_token) = &token.id_token {
        parts.push(format!("id_token={id_token}"));
    }
    if let Some(access_token) = &token.access_token {
        parts.push(format!("access_token={access_token}"));
    }
    parts.push(format!("providerId={}", kind.provider_id()));
    parts.join("&")
}

/// Map an Identity Toolkit error reason onto the canonical rejection code.
/// Reasons sometimes carry a trailing explanation (`WEAK_PASSWORD : ...`);
/// only the leading word is significant.
fn rejection_code(reason: &str) -> String {
    let leading = reason.split_whitespace().next().unwrap_or(reason);
    let code = match leading {
        "EMAIL_NOT_FOUND" => "auth/user-not-found",
        "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => "auth/wrong-password",
        "EMAIL_EXISTS" => "auth/email-already-in-use",
        "INVALID_EMAIL" | "MISSING_EMAIL" => "auth/invalid-email",
        "WEAK_PASSWORD" | "MISSING_PASSWORD" => "auth/weak-password",
        "OPERATION_NOT_ALLOWED" | "PASSWORD_LOGIN_DISABLED" => "auth/operation-not-allowed",
        "FEDERATED_USER_ID_ALREADY_LINKED" => "auth/account-exists-with-different-credential",
        _ => "auth/internal-error",
    };
    code.to_owned()
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
