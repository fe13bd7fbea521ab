//! Notification profile records and token registration.
//!
//! DESIGN
//! ======
//! A profile holds the set of device tokens registered for one identity.
//! Registration is a read-modify-write: look the profile up, append the
//! token if it is new, persist only when something changed. Re-registering
//! a token that is already present performs no write at all, so the client
//! can re-run registration on every reload without churning the store.
//!
//! TRADE-OFFS
//! ==========
//! The read-modify-write is not isolated against concurrent writers — two
//! devices of the same identity registering simultaneously race, and the
//! last write wins. Token sets are append-mostly and collisions are rare,
//! so this is accepted rather than coordinated. Stale tokens from reissued
//! registrations are likewise left in place.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::store::{DocumentStore, Document, PROFILES_COLLECTION, StoreError};

/// Document field holding the registered token set.
const TOKENS_FIELD: &str = "notificationTokens";

/// Per-identity notification profile: the set of registered device tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    /// Identity id this profile belongs to (the document key).
    pub id: String,
    /// Registered device tokens, deduplicated and unordered.
    pub notification_tokens: BTreeSet<String>,
}

impl Profile {
    /// Create an empty profile for the given identity id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), notification_tokens: BTreeSet::new() }
    }

    /// Decode a profile from its stored document. A missing or null token
    /// field decodes as an empty set; any other shape is a decode error.
    pub fn from_document(id: &str, doc: &Document) -> Result<Self, StoreError> {
        let notification_tokens = match doc.get(TOKENS_FIELD) {
            None | Some(Value::Null) => BTreeSet::new(),
            Some(Value::Array(values)) => values
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(ToOwned::to_owned)
                        .ok_or_else(|| StoreError::Decode(format!("non-string token in profile {id}")))
                })
                .collect::<Result<_, _>>()?,
            Some(other) => {
                return Err(StoreError::Decode(format!(
                    "profile {id}: {TOKENS_FIELD} is {other}, expected array"
                )));
            }
        };
        Ok(Self { id: id.to_owned(), notification_tokens })
    }

    /// Encode the profile into its stored document form.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let tokens: Vec<Value> = self
            .notification_tokens
            .iter()
            .map(|t| Value::String(t.clone()))
            .collect();
        let mut doc = Document::new();
        doc.insert(TOKENS_FIELD.to_owned(), Value::Array(tokens));
        doc
    }
}

/// Result of a token registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterOutcome {
    /// The profile after registration, including the token.
    pub profile: Profile,
    /// Whether the store was written. `false` means the token was already
    /// registered and the call was a no-op.
    pub written: bool,
}

/// Typed access to the `profiles` collection.
#[derive(Clone)]
pub struct ProfileRepository {
    store: Arc<dyn DocumentStore>,
}

impl ProfileRepository {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Fetch the profile for an identity id. `Ok(None)` when none exists.
    pub async fn get(&self, id: &str) -> Result<Option<Profile>, StoreError> {
        let doc = self.store.get(PROFILES_COLLECTION, id).await?;
        doc.map(|d| Profile::from_document(id, &d)).transpose()
    }

    /// Register a device token for an identity. Creates the profile on
    /// first registration; appends the token if it is new; does nothing
    /// when the token is already registered.
    pub async fn register_token(&self, id: &str, token: &str) -> Result<RegisterOutcome, StoreError> {
        let mut profile = match self.get(id).await? {
            Some(existing) => {
                if existing.notification_tokens.contains(token) {
                    debug!(id, "token already registered, skipping write");
                    return Ok(RegisterOutcome { profile: existing, written: false });
                }
                existing
            }
            None => {
                debug!(id, "no profile yet, creating one");
                Profile::new(id)
            }
        };

        profile.notification_tokens.insert(token.to_owned());
        self.store
            .set_merge(PROFILES_COLLECTION, id, profile.to_document())
            .await?;
        debug!(id, tokens = profile.notification_tokens.len(), "profile persisted");
        Ok(RegisterOutcome { profile, written: true })
    }
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
