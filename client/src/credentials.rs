//! Credential operations — sign-in/sign-up/social/link wrappers.
//!
//! DESIGN
//! ======
//! One polymorphic service replaces the per-app copies of this logic. Every
//! operation resolves to an [`AuthOutcome`]: expected provider rejections
//! become user-facing messages from a fixed table and are never surfaced as
//! `Err`. Only unexpected faults propagate, so callers can `?` knowing the
//! error path is exceptional.
//!
//! Sign-up is one logical unit from the caller's perspective: identity
//! creation followed by the user record write. When the record write fails
//! after the identity was created there is no rollback — the outcome then
//! carries both the new identity and an error, and callers must treat it as
//! a recoverable inconsistency rather than a total failure.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, warn};

use nube_core::store::{Document, DocumentStore, USERS_COLLECTION};

use crate::identity::{AuthError, Credential, Identity, IdentityProvider, ProviderKind};

// =============================================================================
// USER-FACING MESSAGES
// =============================================================================

/// Fallback for provider codes without a fixed message.
pub const FALLBACK_AUTH_MESSAGE: &str = "Something unexpected happened. Please try again.";

/// Shown when the user record cannot be loaded after sign-in.
pub const LOAD_PROFILE_MESSAGE: &str = "Could not load your profile data.";

/// Shown when the user record cannot be written during sign-up.
pub const SAVE_USER_MESSAGE: &str = "Could not save your account data.";

/// Map a provider rejection code to its fixed user-facing message.
/// Unknown codes fall back to [`FALLBACK_AUTH_MESSAGE`].
#[must_use]
pub fn error_message(code: &str) -> &'static str {
    match code {
        "auth/email-already-in-use" => "That email address is already in use.",
        "auth/invalid-email" => "The email address is not valid.",
        "auth/weak-password" => "The password must be at least 6 characters long.",
        "auth/user-not-found" => "No account exists for that email.",
        "auth/wrong-password" => "Incorrect email or password.",
        "auth/account-exists-with-different-credential" => {
            "An account already exists with the same email but different sign-in credentials."
        }
        "auth/popup-closed-by-user" => "The sign-in window was closed before completing sign-in.",
        "auth/cancelled-popup-request" => "Only one sign-in window is allowed at a time.",
        "auth/popup-blocked" => {
            "The browser blocked the sign-in window. Please allow popups for this site."
        }
        "auth/operation-not-allowed" => "This sign-in method is not enabled.",
        _ => FALLBACK_AUTH_MESSAGE,
    }
}

// =============================================================================
// REQUEST/RESPONSE TYPES
// =============================================================================

/// Email/password sign-in credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Everything collected by the sign-up form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignUpDetails {
    pub email: String,
    pub password: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub age: Option<u32>,
    pub cellphone: Option<String>,
}

impl SignUpDetails {
    /// The user record persisted at sign-up.
    #[must_use]
    pub fn to_document(&self, uid: &str) -> Document {
        let mut doc = Document::new();
        doc.insert("uid".to_owned(), Value::String(uid.to_owned()));
        doc.insert("email".to_owned(), Value::String(self.email.clone()));
        if let Some(username) = &self.username {
            doc.insert("username".to_owned(), Value::String(username.clone()));
        }
        if let Some(display_name) = &self.display_name {
            doc.insert("displayName".to_owned(), Value::String(display_name.clone()));
        }
        if let Some(age) = self.age {
            doc.insert("age".to_owned(), Value::from(age));
        }
        if let Some(cellphone) = &self.cellphone {
            doc.insert("cellphone".to_owned(), Value::String(cellphone.clone()));
        }
        doc
    }
}

/// Resolved result of a credential operation. The returned value is
/// authoritative for the caller — it does not depend on any session state
/// update having been applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthOutcome {
    /// The signed-in (or newly created) identity, when one exists.
    pub identity: Option<Identity>,
    /// User-facing error message, when the operation did not fully succeed.
    pub error: Option<String>,
}

impl AuthOutcome {
    #[must_use]
    pub fn succeeded(identity: Identity) -> Self {
        Self { identity: Some(identity), error: None }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self { identity: None, error: Some(message.into()) }
    }

    /// Identity exists but a follow-up step failed (e.g. the sign-up user
    /// record write). Recoverable by the caller.
    #[must_use]
    pub fn partial(identity: Identity, message: impl Into<String>) -> Self {
        Self { identity: Some(identity), error: Some(message.into()) }
    }
}

// =============================================================================
// SERVICE
// =============================================================================

/// Credential operations over an injected provider and document store.
#[derive(Clone)]
pub struct CredentialService {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
}

impl CredentialService {
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self { provider, store }
    }

    /// Turn a provider result into an outcome, letting only faults escape.
    fn resolve(result: Result<Identity, AuthError>) -> Result<AuthOutcome, AuthError> {
        match result {
            Ok(identity) => Ok(AuthOutcome::succeeded(identity)),
            Err(AuthError::Rejected { code }) => Ok(AuthOutcome::failed(error_message(&code))),
            Err(AuthError::Network(reason)) => {
                warn!(%reason, "provider unreachable");
                Ok(AuthOutcome::failed(FALLBACK_AUTH_MESSAGE))
            }
            Err(fault) => {
                error!(error = %fault, "unexpected provider fault");
                Err(fault)
            }
        }
    }

    pub async fn sign_in_with_email(&self, credentials: &Credentials) -> Result<AuthOutcome, AuthError> {
        Self::resolve(
            self.provider
                .sign_in_with_email(&credentials.email, &credentials.password)
                .await,
        )
    }

    /// Create the identity, apply the display name, and persist the user
    /// record. No rollback: a failed record write leaves the identity in
    /// place and is reported through the outcome's error.
    pub async fn sign_up_with_email(&self, details: &SignUpDetails) -> Result<AuthOutcome, AuthError> {
        let created = self
            .provider
            .create_identity(&details.email, &details.password)
            .await;
        let mut identity = match Self::resolve(created)? {
            AuthOutcome { identity: Some(identity), .. } => identity,
            rejected => return Ok(rejected),
        };

        if let Some(display_name) = &details.display_name {
            match self.provider.update_display_name(display_name).await {
                Ok(updated) => identity = updated,
                Err(e) => warn!(error = %e, uid = %identity.uid, "display name update failed"),
            }
        }

        if let Err(e) = self
            .store
            .set_merge(USERS_COLLECTION, &identity.uid, details.to_document(&identity.uid))
            .await
        {
            error!(error = %e, uid = %identity.uid, "user record write failed after identity creation");
            return Ok(AuthOutcome::partial(identity, SAVE_USER_MESSAGE));
        }

        Ok(AuthOutcome::succeeded(identity))
    }

    pub async fn sign_in_with_google(&self) -> Result<AuthOutcome, AuthError> {
        Self::resolve(self.provider.sign_in_with_popup(ProviderKind::Google).await)
    }

    pub async fn sign_in_with_facebook(&self) -> Result<AuthOutcome, AuthError> {
        Self::resolve(self.provider.sign_in_with_popup(ProviderKind::Facebook).await)
    }

    /// Link an additional credential onto the signed-in identity.
    pub async fn link_credential(&self, credential: Credential) -> Result<AuthOutcome, AuthError> {
        Self::resolve(self.provider.link_credential(credential).await)
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.provider.sign_out().await
    }

    #[must_use]
    pub fn current_identity(&self) -> Option<Identity> {
        self.provider.current_identity()
    }
}

#[cfg(test)]
#[path = "credentials_test.rs"]
mod tests;
