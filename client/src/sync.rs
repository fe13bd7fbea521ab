//! Profile notification sync — persists freshly issued device tokens.
//!
//! DESIGN
//! ======
//! Registration must happen once a device token AND a signed-in identity
//! are both known, in whichever order they arrive. Each half of the pair is
//! recorded as it shows up; the sync runs when the pair completes and again
//! whenever either half changes. Registration itself is idempotent (the
//! repository skips the write when the token is already present), so
//! re-running on every reload is safe: at most one effective persisted
//! write per distinct token.
//!
//! After a write that actually changed the profile, the updated token set
//! is subscribed to the configured topics. The no-op path subscribes
//! nothing.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use nube_core::profile::ProfileRepository;
use nube_core::store::StoreError;

use crate::identity::Identity;
use crate::messaging::{Messaging, MessagingError};
use crate::session::Session;

/// Errors produced by a sync pass.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Messaging(#[from] MessagingError),
}

#[derive(Default)]
struct PairState {
    token: Option<String>,
    uid: Option<String>,
}

/// Order-independent (token, identity) pair trigger over the profile
/// repository and messaging provider.
pub struct TokenSync {
    profiles: ProfileRepository,
    messaging: Arc<dyn Messaging>,
    topics: Vec<String>,
    // The lock is held across the whole sync pass, so passes never
    // interleave and each observes the previous one's write.
    state: Mutex<PairState>,
}

impl TokenSync {
    #[must_use]
    pub fn new(profiles: ProfileRepository, messaging: Arc<dyn Messaging>, topics: Vec<String>) -> Self {
        Self { profiles, messaging, topics, state: Mutex::new(PairState::default()) }
    }

    /// Record a freshly issued device token; sync if an identity is known.
    pub async fn token_received(&self, token: &str) -> Result<(), SyncError> {
        let mut state = self.state.lock().await;
        state.token = Some(token.to_owned());
        let Some(uid) = state.uid.clone() else {
            return Ok(());
        };
        self.run_sync(&uid, token).await
    }

    /// Record the current identity; sync if a token is known. `None` clears
    /// the identity half — nothing is registered while signed out.
    pub async fn identity_changed(&self, identity: Option<&Identity>) -> Result<(), SyncError> {
        let mut state = self.state.lock().await;
        let Some(identity) = identity else {
            state.uid = None;
            return Ok(());
        };
        state.uid = Some(identity.uid.clone());
        let Some(token) = state.token.clone() else {
            return Ok(());
        };
        self.run_sync(&identity.uid, &token).await
    }

    async fn run_sync(&self, uid: &str, token: &str) -> Result<(), SyncError> {
        let outcome = self.profiles.register_token(uid, token).await?;
        if !outcome.written {
            return Ok(());
        }
        info!(uid, tokens = outcome.profile.notification_tokens.len(), "device token registered");

        let tokens: Vec<String> = outcome.profile.notification_tokens.iter().cloned().collect();
        for topic in &self.topics {
            self.messaging.subscribe_to_topic(&tokens, topic).await?;
            info!(uid, topic = %topic, "token set subscribed to topic");
        }
        Ok(())
    }
}

/// Wire a session stream and a one-shot token request into the pair
/// trigger. Returns the task handle; aborting it stops the sync.
pub fn spawn_token_sync(
    mut sessions: watch::Receiver<Session>,
    sync: Arc<TokenSync>,
    vapid_key: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match sync.messaging.request_token(&vapid_key).await {
            Ok(Some(token)) => {
                if let Err(e) = sync.token_received(&token).await {
                    error!(error = %e, "device token registration failed");
                }
            }
            Ok(None) => warn!("no registration token available; request permission to generate one"),
            Err(e) => error!(error = %e, "device token request failed"),
        }

        loop {
            let identity = sessions.borrow_and_update().identity.clone();
            if let Err(e) = sync.identity_changed(identity.as_ref()).await {
                error!(error = %e, "token sync failed on identity change");
            }
            if sessions.changed().await.is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
#[path = "sync_test.rs"]
mod tests;
