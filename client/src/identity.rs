//! Identity provider contract.
//!
//! DESIGN
//! ======
//! The identity provider is the externally hosted authority that issues and
//! mutates principals. This module owns the provider-neutral types and the
//! async trait the rest of the crate programs against; concrete adapters
//! live in [`crate::firebase`] and in test fakes.
//!
//! Identity changes are delivered over a `tokio::sync::watch` channel
//! wrapped in [`IdentityEvents`]. Watch semantics mean a subscriber only
//! ever observes the latest value — notifications are never queued up
//! behind a slow consumer — and dropping the receiver is the unsubscribe.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

// =============================================================================
// TYPES
// =============================================================================

/// An externally issued principal.
///
/// Immutable from this crate's perspective except through the explicit
/// link/update operations on [`IdentityProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider-assigned unique id.
    pub uid: String,
    /// Primary email address, if the provider knows one.
    pub email: Option<String>,
    /// Display name, if set.
    pub display_name: Option<String>,
    /// Photo reference, if set.
    pub photo_url: Option<String>,
    /// Ids of the linked authentication providers, e.g. `"password"`,
    /// `"google.com"`, `"phone"`.
    pub provider_ids: Vec<String>,
}

impl Identity {
    /// Minimal identity with just a uid. Fills the rest with `None`.
    #[must_use]
    pub fn with_uid(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
            photo_url: None,
            provider_ids: Vec::new(),
        }
    }
}

/// Social sign-in backends reachable through a popup/redirect flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Google,
    Facebook,
}

impl ProviderKind {
    /// Canonical provider id as used in [`Identity::provider_ids`].
    #[must_use]
    pub fn provider_id(self) -> &'static str {
        match self {
            Self::Google => "google.com",
            Self::Facebook => "facebook.com",
        }
    }
}

/// A credential that can be linked onto the current identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Email + password credential.
    EmailPassword { email: String, password: String },
    /// Phone credential from a completed verification flow.
    Phone {
        verification_id: String,
        verification_code: String,
    },
}

// =============================================================================
// ERRORS
// =============================================================================

/// Errors produced by identity provider operations.
///
/// `Rejected` and `Network` are the expected failure modes — the credential
/// layer turns them into user-facing messages and they never escape it as
/// `Err`. `Fault` is for genuinely unexpected conditions and propagates.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The provider rejected the operation with a stable code, e.g.
    /// `auth/wrong-password`.
    #[error("authentication rejected: {code}")]
    Rejected { code: String },

    /// The provider could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// Unexpected provider or programming fault.
    #[error("provider fault: {0}")]
    Fault(String),
}

impl AuthError {
    #[must_use]
    pub fn rejected(code: impl Into<String>) -> Self {
        Self::Rejected { code: code.into() }
    }
}

// =============================================================================
// CHANGE STREAM
// =============================================================================

/// Subscription to the provider's identity change stream.
///
/// The current identity is delivered immediately on the first call to
/// [`IdentityEvents::next`], mirroring how auth state observers report the
/// already-known state up front. Dropping the subscription releases it —
/// there is no separate unsubscribe call to forget.
pub struct IdentityEvents {
    receiver: watch::Receiver<Option<Identity>>,
    primed: bool,
}

impl IdentityEvents {
    #[must_use]
    pub fn new(receiver: watch::Receiver<Option<Identity>>) -> Self {
        Self { receiver, primed: false }
    }

    /// Wait for the next identity value.
    ///
    /// Returns the current value immediately on first call, then one value
    /// per observed change (intermediate values may be skipped). Returns
    /// `None` once the provider side has gone away.
    pub async fn next(&mut self) -> Option<Option<Identity>> {
        if self.primed {
            self.receiver.changed().await.ok()?;
        }
        self.primed = true;
        Some(self.receiver.borrow_and_update().clone())
    }
}

// =============================================================================
// PROVIDER TRAIT
// =============================================================================

/// The externally hosted identity authority.
///
/// Expected rejections (bad credentials, dismissed popups, account
/// collisions) surface as [`AuthError::Rejected`]; implementations must not
/// panic for them.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Sign in with an email/password credential.
    async fn sign_in_with_email(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    /// Create a new identity from an email/password credential and sign it in.
    async fn create_identity(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    /// Sign in through a social provider's interactive flow.
    async fn sign_in_with_popup(&self, kind: ProviderKind) -> Result<Identity, AuthError>;

    /// Link an additional credential onto the currently signed-in identity.
    async fn link_credential(&self, credential: Credential) -> Result<Identity, AuthError>;

    /// Update the display name of the currently signed-in identity.
    async fn update_display_name(&self, display_name: &str) -> Result<Identity, AuthError>;

    /// Sign the current identity out.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// The identity the provider currently considers signed in, if any.
    fn current_identity(&self) -> Option<Identity>;

    /// Subscribe to identity changes.
    fn subscribe(&self) -> IdentityEvents;
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
