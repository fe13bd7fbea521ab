//! Firebase adapters for the provider contracts.
//!
//! SYSTEM CONTEXT
//! ==============
//! Production composition roots build these adapters from [`config::FirebaseConfig`]
//! and hand them to the session store and token sync as trait objects:
//! [`auth::FirebaseAuthProvider`] speaks the Identity Toolkit REST API,
//! [`fcm::FcmMessaging`] speaks the Installations/FCM registration and
//! topic APIs, and `nube_core::firestore::FirestoreStore` covers the
//! document store. Interactive pieces the platform owns (OAuth popups,
//! the push transport) are injected as small callbacks rather than
//! reimplemented here.

pub mod auth;
pub mod config;
pub mod fcm;
