use std::sync::Arc;

use serde_json::json;

use super::*;
use nube_core::memory::MemoryStore;

fn doc(value: serde_json::Value) -> Document {
    value.as_object().cloned().expect("test doc must be an object")
}

fn identity() -> Identity {
    Identity {
        uid: "u1".into(),
        email: Some("provider@example.com".into()),
        display_name: Some("Provider Name".into()),
        photo_url: Some("https://example.com/provider.png".into()),
        provider_ids: vec!["password".into()],
    }
}

// =============================================================================
// UserProfile::from_document
// =============================================================================

#[test]
fn stored_fields_win_over_identity() {
    let profile = UserProfile::from_document(
        &identity(),
        &doc(json!({
            "email": "stored@example.com",
            "username": "ana",
            "displayName": "Stored Name",
            "photoURL": "https://example.com/stored.png",
        })),
    );
    assert_eq!(profile.email, "stored@example.com");
    assert_eq!(profile.username.as_deref(), Some("ana"));
    assert_eq!(profile.display_name.as_deref(), Some("Stored Name"));
    assert_eq!(profile.photo_url.as_deref(), Some("https://example.com/stored.png"));
}

#[test]
fn identity_fills_gaps_in_the_record() {
    let profile = UserProfile::from_document(&identity(), &doc(json!({ "username": "ana" })));
    assert_eq!(profile.email, "provider@example.com");
    assert_eq!(profile.display_name.as_deref(), Some("Provider Name"));
    assert_eq!(profile.photo_url.as_deref(), Some("https://example.com/provider.png"));
}

#[test]
fn email_defaults_to_empty_when_nowhere() {
    let mut bare = identity();
    bare.email = None;
    let profile = UserProfile::from_document(&bare, &doc(json!({})));
    assert_eq!(profile.email, "");
}

// =============================================================================
// fetch_user_profile
// =============================================================================

#[tokio::test]
async fn absent_record_is_none_not_an_error() {
    let store = Arc::new(MemoryStore::new());
    let fetched = fetch_user_profile(store.as_ref(), &identity()).await.unwrap();
    assert!(fetched.is_none());
}

#[tokio::test]
async fn present_record_hydrates() {
    let store = Arc::new(MemoryStore::new());
    store
        .set_merge(USERS_COLLECTION, "u1", doc(json!({ "username": "ana" })))
        .await
        .unwrap();
    let fetched = fetch_user_profile(store.as_ref(), &identity()).await.unwrap().unwrap();
    assert_eq!(fetched.uid, "u1");
    assert_eq!(fetched.username.as_deref(), Some("ana"));
}
