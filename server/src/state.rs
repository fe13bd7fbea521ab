//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the profile repository over the document store and the admin
//! messaging client, both behind trait objects so tests run against
//! in-memory doubles.

use std::sync::Arc;

use nube_core::firestore::{FirestoreAuth, FirestoreStore};
use nube_core::profile::ProfileRepository;
use nube_core::store::DocumentStore;

use crate::services::fcm::{FcmHttp, TopicMessaging};

/// Connection settings for the production backends.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub project_id: String,
    pub firestore_token: String,
    pub fcm_server_key: String,
}

impl DispatchConfig {
    /// Load from `FIREBASE_PROJECT_ID`, `FIRESTORE_ACCESS_TOKEN`,
    /// `FCM_SERVER_KEY`. Returns `None` if any are missing.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let project_id = std::env::var("FIREBASE_PROJECT_ID").ok()?;
        let firestore_token = std::env::var("FIRESTORE_ACCESS_TOKEN").ok()?;
        let fcm_server_key = std::env::var("FCM_SERVER_KEY").ok()?;
        Some(Self { project_id, firestore_token, fcm_server_key })
    }
}

/// Shared application state, injected into Axum handlers via State
/// extractor. Clone is required by Axum — all inner fields are Arc-backed.
#[derive(Clone)]
pub struct AppState {
    pub profiles: ProfileRepository,
    pub messaging: Arc<dyn TopicMessaging>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, messaging: Arc<dyn TopicMessaging>) -> Self {
        Self { profiles: ProfileRepository::new(store), messaging }
    }

    /// Wire the production Firestore and FCM backends.
    #[must_use]
    pub fn from_config(config: &DispatchConfig) -> Self {
        let store = Arc::new(FirestoreStore::new(
            config.project_id.clone(),
            FirestoreAuth::Bearer(config.firestore_token.clone()),
        ));
        let messaging = Arc::new(FcmHttp::new(config.fcm_server_key.clone()));
        Self::new(store, messaging)
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
