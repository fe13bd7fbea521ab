//! Session store — the client-side authentication state machine.
//!
//! ARCHITECTURE
//! ============
//! Exactly one `Session` value exists per running client. It starts in
//! `Loading`, leaves it when the first identity change is observed, and
//! never returns to it; per-operation progress is the separate `pending`
//! flag. Consumers read snapshots or subscribe to a watch channel; the
//! store itself is updated by credential operations and by the observer
//! task that follows the provider's identity change stream.
//!
//! TEARDOWN
//! ========
//! `observe` hands back a guard that aborts the observer task and bumps the
//! store epoch when dropped. Hydrations still in flight from the old
//! subscription compare epochs before publishing and are dropped silently —
//! a stale write is suppressed, never applied.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use nube_core::store::DocumentStore;

use crate::credentials::{
    AuthOutcome, CredentialService, Credentials, FALLBACK_AUTH_MESSAGE, LOAD_PROFILE_MESSAGE,
    SignUpDetails,
};
use crate::identity::{AuthError, Credential, Identity, IdentityProvider};
use crate::user::{UserProfile, fetch_user_profile};

// =============================================================================
// SESSION STATE
// =============================================================================

/// Lifecycle phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No identity change has been observed yet.
    Loading,
    /// The session reflects the provider's last reported state.
    Ready,
    /// The last operation or hydration failed; `error` carries the message.
    /// User-recoverable by retrying — never terminal.
    Error,
}

/// Client-local derived state: the current identity and its profile data.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub identity: Option<Identity>,
    pub profile: Option<UserProfile>,
    pub status: SessionStatus,
    /// A credential operation is in flight. Distinct from the initial
    /// `Loading` status, which is only ever observed before the first
    /// identity change arrives.
    pub pending: bool,
    pub error: Option<String>,
}

impl Session {
    #[must_use]
    pub fn initial() -> Self {
        Self {
            identity: None,
            profile: None,
            status: SessionStatus::Loading,
            pending: false,
            error: None,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::initial()
    }
}

// =============================================================================
// STORE
// =============================================================================

struct SessionInner {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
    credentials: CredentialService,
    state: watch::Sender<Session>,
    /// Bumped when an observer is torn down; in-flight hydrations from the
    /// old subscription compare against it before publishing.
    epoch: AtomicU64,
}

impl SessionInner {
    fn publish_if_current(&self, epoch: u64, apply: impl FnOnce(&mut Session)) {
        if self.epoch.load(Ordering::Acquire) == epoch {
            self.state.send_modify(apply);
        } else {
            debug!("suppressing session update from torn-down subscription");
        }
    }

    /// Hydrate the user profile and publish the resulting session state for
    /// a present identity.
    async fn hydrate_and_publish(&self, epoch: u64, identity: Identity) {
        match fetch_user_profile(self.store.as_ref(), &identity).await {
            Ok(profile) => self.publish_if_current(epoch, |s| {
                s.identity = Some(identity);
                s.profile = profile;
                s.status = SessionStatus::Ready;
                s.pending = false;
                s.error = None;
            }),
            Err(e) => {
                error!(error = %e, uid = %identity.uid, "profile hydration failed");
                self.publish_if_current(epoch, |s| {
                    s.identity = Some(identity);
                    s.profile = None;
                    s.status = SessionStatus::Error;
                    s.pending = false;
                    s.error = Some(LOAD_PROFILE_MESSAGE.to_owned());
                });
            }
        }
    }

    async fn apply_identity_change(&self, epoch: u64, change: Option<Identity>) {
        match change {
            Some(identity) => self.hydrate_and_publish(epoch, identity).await,
            None => self.publish_if_current(epoch, |s| {
                s.identity = None;
                s.profile = None;
                s.status = SessionStatus::Ready;
                s.pending = false;
                s.error = None;
            }),
        }
    }
}

/// The session store. Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionInner>,
}

impl SessionStore {
    /// Build a store over injected provider and document store handles.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<dyn DocumentStore>) -> Self {
        let credentials = CredentialService::new(provider.clone(), store.clone());
        let (state, _) = watch::channel(Session::initial());
        Self {
            inner: Arc::new(SessionInner {
                provider,
                store,
                credentials,
                state,
                epoch: AtomicU64::new(0),
            }),
        }
    }

    /// Current session state.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    /// Subscribe to session state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// The credential operations this store drives. Exposed for callers
    /// that need outcomes without session bookkeeping.
    #[must_use]
    pub fn credentials(&self) -> &CredentialService {
        &self.inner.credentials
    }

    // =========================================================================
    // OBSERVATION
    // =========================================================================

    /// Follow the provider's identity change stream for the lifetime of the
    /// returned guard. Each observed change hydrates the user profile and
    /// publishes `Ready`, or `Error` with the identity still set when
    /// hydration fails.
    #[must_use = "dropping the observer stops session updates"]
    pub fn observe(&self) -> SessionObserver {
        let inner = self.inner.clone();
        let epoch = inner.epoch.load(Ordering::Acquire);
        let mut events = inner.provider.subscribe();
        let task = tokio::spawn(async move {
            while let Some(change) = events.next().await {
                inner.apply_identity_change(epoch, change).await;
            }
        });
        SessionObserver { inner: self.inner.clone(), task }
    }

    // =========================================================================
    // CREDENTIAL OPERATIONS
    // =========================================================================

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<AuthOutcome, AuthError> {
        let service = self.inner.credentials.clone();
        self.run_operation(service.sign_in_with_email(credentials)).await
    }

    pub async fn sign_up(&self, details: &SignUpDetails) -> Result<AuthOutcome, AuthError> {
        let service = self.inner.credentials.clone();
        self.run_operation(service.sign_up_with_email(details)).await
    }

    pub async fn sign_in_with_google(&self) -> Result<AuthOutcome, AuthError> {
        let service = self.inner.credentials.clone();
        self.run_operation(service.sign_in_with_google()).await
    }

    pub async fn sign_in_with_facebook(&self) -> Result<AuthOutcome, AuthError> {
        let service = self.inner.credentials.clone();
        self.run_operation(service.sign_in_with_facebook()).await
    }

    /// Link an additional credential onto the signed-in identity.
    pub async fn link_credential(&self, credential: Credential) -> Result<AuthOutcome, AuthError> {
        let service = self.inner.credentials.clone();
        self.run_operation(service.link_credential(credential)).await
    }

    /// Sign out. The local session is reset to no identity even when the
    /// provider call fails — a revoked identity must never linger locally.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let result = self.inner.credentials.sign_out().await;
        if let Err(e) = &result {
            error!(error = %e, "provider sign-out failed; clearing local session anyway");
        }
        self.inner.state.send_modify(|s| {
            *s = Session {
                identity: None,
                profile: None,
                status: SessionStatus::Ready,
                pending: false,
                error: None,
            };
        });
        result
    }

    /// Clear the error message. Identity and profile are untouched; an
    /// `Error` status collapses back to `Ready`.
    pub fn clear_error(&self) {
        self.inner.state.send_modify(|s| {
            s.error = None;
            if s.status == SessionStatus::Error {
                s.status = SessionStatus::Ready;
            }
        });
    }

    /// Drive one credential operation through the session: flag it pending,
    /// apply the resolved outcome to the state, and hand the outcome back.
    /// The returned value is authoritative regardless of what the state
    /// update did.
    async fn run_operation(
        &self,
        operation: impl Future<Output = Result<AuthOutcome, AuthError>>,
    ) -> Result<AuthOutcome, AuthError> {
        let inner = &self.inner;
        inner.state.send_modify(|s| {
            s.pending = true;
            s.error = None;
        });

        let result = operation.await;
        match &result {
            Ok(outcome) => self.apply_outcome(outcome).await,
            Err(fault) => {
                error!(error = %fault, "credential operation fault");
                inner.state.send_modify(|s| {
                    s.status = SessionStatus::Error;
                    s.pending = false;
                    s.error = Some(FALLBACK_AUTH_MESSAGE.to_owned());
                });
            }
        }
        result
    }

    async fn apply_outcome(&self, outcome: &AuthOutcome) {
        let inner = &self.inner;
        match (&outcome.identity, &outcome.error) {
            // Full success: hydrate and go Ready.
            (Some(identity), None) => {
                let epoch = inner.epoch.load(Ordering::Acquire);
                inner.hydrate_and_publish(epoch, identity.clone()).await;
            }
            // Identity exists but a follow-up step failed (sign-up record
            // write): keep the identity, surface the error.
            (Some(identity), Some(message)) => {
                let identity = identity.clone();
                let message = message.clone();
                inner.state.send_modify(|s| {
                    s.identity = Some(identity);
                    s.profile = None;
                    s.status = SessionStatus::Error;
                    s.pending = false;
                    s.error = Some(message);
                });
            }
            // Expected rejection: record the message, leave identity as-is.
            (None, Some(message)) => {
                let message = message.clone();
                inner.state.send_modify(|s| {
                    s.status = SessionStatus::Error;
                    s.pending = false;
                    s.error = Some(message);
                });
            }
            (None, None) => inner.state.send_modify(|s| s.pending = false),
        }
    }
}

/// Guard for an active [`SessionStore::observe`] subscription. Dropping it
/// unsubscribes and suppresses any update still in flight.
#[must_use = "dropping the observer stops session updates"]
pub struct SessionObserver {
    inner: Arc<SessionInner>,
    task: JoinHandle<()>,
}

impl Drop for SessionObserver {
    fn drop(&mut self) {
        self.inner.epoch.fetch_add(1, Ordering::Release);
        self.task.abort();
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
