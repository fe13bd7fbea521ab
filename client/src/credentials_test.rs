use std::sync::Arc;

use serde_json::json;

use super::*;
use crate::fakes::{FakeIdentityProvider, FlakyStore};

fn service() -> (CredentialService, Arc<FakeIdentityProvider>, Arc<FlakyStore>) {
    let provider = Arc::new(FakeIdentityProvider::new());
    let store = Arc::new(FlakyStore::new());
    (CredentialService::new(provider.clone(), store.clone()), provider, store)
}

// =============================================================================
// error_message
// =============================================================================

#[test]
fn known_code_maps_to_fixed_string() {
    assert_eq!(error_message("auth/wrong-password"), "Incorrect email or password.");
}

#[test]
fn known_codes_have_distinct_messages() {
    let codes = [
        "auth/email-already-in-use",
        "auth/invalid-email",
        "auth/weak-password",
        "auth/user-not-found",
        "auth/wrong-password",
        "auth/account-exists-with-different-credential",
        "auth/popup-closed-by-user",
        "auth/cancelled-popup-request",
        "auth/popup-blocked",
        "auth/operation-not-allowed",
    ];
    for code in codes {
        assert_ne!(error_message(code), FALLBACK_AUTH_MESSAGE, "no fixed message for {code}");
    }
}

#[test]
fn unknown_code_falls_back_to_generic_message() {
    assert_eq!(error_message("auth/some-new-code"), FALLBACK_AUTH_MESSAGE);
    assert_eq!(error_message(""), FALLBACK_AUTH_MESSAGE);
}

// =============================================================================
// sign_in_with_email
// =============================================================================

#[tokio::test]
async fn sign_in_success_has_identity_and_no_error() {
    let (service, provider, _store) = service();
    let identity = provider.with_account("ana@example.com", "secret123");

    let outcome = service
        .sign_in_with_email(&Credentials { email: "ana@example.com".into(), password: "secret123".into() })
        .await
        .unwrap();
    assert_eq!(outcome.identity.unwrap().uid, identity.uid);
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn sign_in_unknown_email_is_an_outcome_not_an_err() {
    let (service, _provider, _store) = service();
    let outcome = service
        .sign_in_with_email(&Credentials { email: "ghost@example.com".into(), password: "x".into() })
        .await
        .unwrap();
    assert!(outcome.identity.is_none());
    assert_eq!(outcome.error.as_deref(), Some("No account exists for that email."));
}

#[tokio::test]
async fn sign_in_fault_propagates_as_err() {
    let (service, provider, _store) = service();
    provider.with_account("ana@example.com", "secret123");
    provider.fault_next_sign_in();

    let result = service
        .sign_in_with_email(&Credentials { email: "ana@example.com".into(), password: "secret123".into() })
        .await;
    assert!(matches!(result, Err(AuthError::Fault(_))));
}

// =============================================================================
// sign_up_with_email
// =============================================================================

#[tokio::test]
async fn sign_up_creates_identity_and_user_record() {
    let (service, _provider, store) = service();
    let details = SignUpDetails {
        email: "new@example.com".into(),
        password: "secret123".into(),
        username: Some("newbie".into()),
        age: Some(30),
        cellphone: Some("555-0100".into()),
        ..SignUpDetails::default()
    };

    let outcome = service.sign_up_with_email(&details).await.unwrap();
    let identity = outcome.identity.unwrap();
    assert!(outcome.error.is_none());

    let doc = store
        .get(USERS_COLLECTION, &identity.uid)
        .await
        .unwrap()
        .expect("user record must be written at sign-up");
    assert_eq!(doc.get("email"), Some(&json!("new@example.com")));
    assert_eq!(doc.get("username"), Some(&json!("newbie")));
    assert_eq!(doc.get("age"), Some(&json!(30)));
    assert_eq!(doc.get("uid"), Some(&json!(identity.uid)));
}

#[tokio::test]
async fn sign_up_applies_display_name() {
    let (service, _provider, _store) = service();
    let outcome = service
        .sign_up_with_email(&SignUpDetails {
            email: "new@example.com".into(),
            password: "secret123".into(),
            display_name: Some("New User".into()),
            ..SignUpDetails::default()
        })
        .await
        .unwrap();
    assert_eq!(outcome.identity.unwrap().display_name.as_deref(), Some("New User"));
}

#[tokio::test]
async fn sign_up_existing_email_is_rejected_outcome() {
    let (service, provider, _store) = service();
    provider.with_account("taken@example.com", "whatever");

    let outcome = service
        .sign_up_with_email(&SignUpDetails {
            email: "taken@example.com".into(),
            password: "secret123".into(),
            ..SignUpDetails::default()
        })
        .await
        .unwrap();
    assert!(outcome.identity.is_none());
    assert_eq!(outcome.error.as_deref(), Some("That email address is already in use."));
}

#[tokio::test]
async fn sign_up_record_write_failure_returns_partial_outcome() {
    let (service, _provider, store) = service();
    store.fail_writes();

    let outcome = service
        .sign_up_with_email(&SignUpDetails {
            email: "new@example.com".into(),
            password: "secret123".into(),
            ..SignUpDetails::default()
        })
        .await
        .unwrap();
    assert!(outcome.identity.is_some(), "identity stays created, no rollback");
    assert_eq!(outcome.error.as_deref(), Some(SAVE_USER_MESSAGE));
}

#[tokio::test]
async fn sign_up_retry_after_outage_completes_the_record() {
    let (service, _provider, store) = service();
    store.fail_writes();
    let first = service
        .sign_up_with_email(&SignUpDetails {
            email: "new@example.com".into(),
            password: "secret123".into(),
            ..SignUpDetails::default()
        })
        .await
        .unwrap();
    let uid = first.identity.unwrap().uid;

    // The identity survived the outage, so a plain sign-in works once the
    // store heals.
    store.restore();
    let retry = service
        .sign_in_with_email(&Credentials { email: "new@example.com".into(), password: "secret123".into() })
        .await
        .unwrap();
    assert_eq!(retry.identity.unwrap().uid, uid);
}

// =============================================================================
// social sign-in / linking
// =============================================================================

#[tokio::test]
async fn google_rejection_code_maps_through_table() {
    let (service, provider, _store) = service();
    provider.set_popup_rejection("auth/popup-blocked");

    let outcome = service.sign_in_with_google().await.unwrap();
    assert_eq!(
        outcome.error.as_deref(),
        Some("The browser blocked the sign-in window. Please allow popups for this site.")
    );
}

#[tokio::test]
async fn link_without_signed_in_identity_is_a_fault() {
    let (service, _provider, _store) = service();
    let result = service
        .link_credential(Credential::EmailPassword {
            email: "ana@example.com".into(),
            password: "secret123".into(),
        })
        .await;
    assert!(matches!(result, Err(AuthError::Fault(_))));
}

// =============================================================================
// SignUpDetails::to_document
// =============================================================================

#[test]
fn to_document_skips_absent_fields() {
    let details = SignUpDetails {
        email: "a@b.c".into(),
        password: "pw".into(),
        ..SignUpDetails::default()
    };
    let doc = details.to_document("u1");
    assert_eq!(doc.get("email"), Some(&json!("a@b.c")));
    assert_eq!(doc.get("uid"), Some(&json!("u1")));
    assert!(!doc.contains_key("username"));
    assert!(!doc.contains_key("age"));
    assert!(!doc.contains_key("cellphone"));
    assert!(!doc.contains_key("password"), "credentials never land in the store");
}
