//! User metadata records.
//!
//! The `users` collection holds one record per identity with the data the
//! apps show next to the principal (email, username, display name, photo).
//! The record is written at sign-up with merge semantics and read on every
//! identity change to hydrate the session. Stored fields win over the
//! provider's own values; the provider fills the gaps.

use serde_json::Value;

use nube_core::store::{Document, DocumentStore, StoreError, USERS_COLLECTION};

use crate::identity::Identity;

/// User metadata hydrated into the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

fn string_field(doc: &Document, name: &str) -> Option<String> {
    doc.get(name).and_then(Value::as_str).map(ToOwned::to_owned)
}

impl UserProfile {
    /// Build the hydrated view of a stored record, falling back to the
    /// identity's own fields where the record is silent.
    #[must_use]
    pub fn from_document(identity: &Identity, doc: &Document) -> Self {
        Self {
            uid: identity.uid.clone(),
            email: string_field(doc, "email")
                .or_else(|| identity.email.clone())
                .unwrap_or_default(),
            username: string_field(doc, "username"),
            display_name: string_field(doc, "displayName").or_else(|| identity.display_name.clone()),
            photo_url: string_field(doc, "photoURL").or_else(|| identity.photo_url.clone()),
        }
    }
}

/// Fetch the user record for an identity. `Ok(None)` when no record exists —
/// that is a valid state, not an error.
pub async fn fetch_user_profile(
    store: &dyn DocumentStore,
    identity: &Identity,
) -> Result<Option<UserProfile>, StoreError> {
    let doc = store.get(USERS_COLLECTION, &identity.uid).await?;
    Ok(doc.map(|d| UserProfile::from_document(identity, &d)))
}

#[cfg(test)]
#[path = "user_test.rs"]
mod tests;
