//! Shared test fakes for the provider contracts.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use nube_core::memory::MemoryStore;
use nube_core::store::{Document, DocumentStore, StoreError};

use crate::identity::{
    AuthError, Credential, Identity, IdentityEvents, IdentityProvider, ProviderKind,
};
use crate::messaging::{MessageEvents, MessagePayload, Messaging, MessagingError};

// =============================================================================
// IDENTITY PROVIDER
// =============================================================================

/// Scriptable in-memory identity provider.
pub(crate) struct FakeIdentityProvider {
    accounts: Mutex<HashMap<String, (String, Identity)>>,
    current: watch::Sender<Option<Identity>>,
    popup: Mutex<Option<Result<Identity, String>>>,
    fail_sign_out: AtomicBool,
    fault_next_sign_in: AtomicBool,
}

impl FakeIdentityProvider {
    pub(crate) fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            current,
            popup: Mutex::new(None),
            fail_sign_out: AtomicBool::new(false),
            fault_next_sign_in: AtomicBool::new(false),
        }
    }

    /// Register an email/password account and return its identity.
    pub(crate) fn with_account(&self, email: &str, password: &str) -> Identity {
        let identity = Identity {
            uid: uuid::Uuid::new_v4().to_string(),
            email: Some(email.to_owned()),
            display_name: None,
            photo_url: None,
            provider_ids: vec!["password".to_owned()],
        };
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_owned(), (password.to_owned(), identity.clone()));
        identity
    }

    /// Script the next popup flows to sign in as `identity`.
    pub(crate) fn set_popup_identity(&self, identity: Identity) {
        *self.popup.lock().unwrap() = Some(Ok(identity));
    }

    /// Script popup flows to be rejected with the given code.
    pub(crate) fn set_popup_rejection(&self, code: &str) {
        *self.popup.lock().unwrap() = Some(Err(code.to_owned()));
    }

    /// Make `sign_out` fail (without clearing the provider-side identity).
    pub(crate) fn fail_sign_out(&self) {
        self.fail_sign_out.store(true, Ordering::SeqCst);
    }

    /// Make the next email sign-in return an unexpected fault.
    pub(crate) fn fault_next_sign_in(&self) {
        self.fault_next_sign_in.store(true, Ordering::SeqCst);
    }

    /// Drive an identity change as if the backend reported one.
    pub(crate) fn emit(&self, identity: Option<Identity>) {
        self.current.send_replace(identity);
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn sign_in_with_email(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        if self.fault_next_sign_in.swap(false, Ordering::SeqCst) {
            return Err(AuthError::Fault("simulated provider fault".to_owned()));
        }
        let account = self.accounts.lock().unwrap().get(email).cloned();
        match account {
            None => Err(AuthError::rejected("auth/user-not-found")),
            Some((expected, _)) if expected != password => {
                Err(AuthError::rejected("auth/wrong-password"))
            }
            Some((_, identity)) => {
                self.emit(Some(identity.clone()));
                Ok(identity)
            }
        }
    }

    async fn create_identity(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        if self.accounts.lock().unwrap().contains_key(email) {
            return Err(AuthError::rejected("auth/email-already-in-use"));
        }
        let identity = self.with_account(email, password);
        self.emit(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in_with_popup(&self, _kind: ProviderKind) -> Result<Identity, AuthError> {
        let scripted = self.popup.lock().unwrap().clone();
        match scripted {
            None => Err(AuthError::rejected("auth/popup-closed-by-user")),
            Some(Err(code)) => Err(AuthError::rejected(code)),
            Some(Ok(identity)) => {
                self.emit(Some(identity.clone()));
                Ok(identity)
            }
        }
    }

    async fn link_credential(&self, credential: Credential) -> Result<Identity, AuthError> {
        let Some(mut identity) = self.current.borrow().clone() else {
            return Err(AuthError::Fault("no identity is signed in".to_owned()));
        };
        let provider_id = match credential {
            Credential::EmailPassword { .. } => "password",
            Credential::Phone { .. } => "phone",
        };
        if !identity.provider_ids.iter().any(|p| p == provider_id) {
            identity.provider_ids.push(provider_id.to_owned());
        }
        self.emit(Some(identity.clone()));
        Ok(identity)
    }

    async fn update_display_name(&self, display_name: &str) -> Result<Identity, AuthError> {
        let Some(mut identity) = self.current.borrow().clone() else {
            return Err(AuthError::Fault("no identity is signed in".to_owned()));
        };
        identity.display_name = Some(display_name.to_owned());
        self.emit(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(AuthError::Fault("simulated sign-out failure".to_owned()));
        }
        self.emit(None);
        Ok(())
    }

    fn current_identity(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    fn subscribe(&self) -> IdentityEvents {
        IdentityEvents::new(self.current.subscribe())
    }
}

// =============================================================================
// MESSAGING
// =============================================================================

/// Recording in-memory messaging provider.
#[derive(Default)]
pub(crate) struct FakeMessaging {
    pub(crate) token: Mutex<Option<String>>,
    pub(crate) subscriptions: Mutex<Vec<(Vec<String>, String)>>,
    pub(crate) fail_subscribe: AtomicBool,
    listeners: Mutex<Vec<mpsc::Sender<MessagePayload>>>,
}

impl FakeMessaging {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_token(token: &str) -> Self {
        let fake = Self::default();
        *fake.token.lock().unwrap() = Some(token.to_owned());
        fake
    }

    pub(crate) fn deliver(&self, payload: &MessagePayload) {
        let mut listeners = self.listeners.lock().unwrap();
        listeners.retain(|sender| sender.try_send(payload.clone()).is_ok());
    }
}

#[async_trait]
impl Messaging for FakeMessaging {
    async fn request_token(&self, _vapid_key: &str) -> Result<Option<String>, MessagingError> {
        Ok(self.token.lock().unwrap().clone())
    }

    fn messages(&self) -> MessageEvents {
        let (sender, receiver) = mpsc::channel(16);
        self.listeners.lock().unwrap().push(sender);
        MessageEvents::new(receiver)
    }

    async fn subscribe_to_topic(&self, tokens: &[String], topic: &str) -> Result<(), MessagingError> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(MessagingError::Request("simulated subscription failure".to_owned()));
        }
        self.subscriptions
            .lock()
            .unwrap()
            .push((tokens.to_vec(), topic.to_owned()));
        Ok(())
    }
}

// =============================================================================
// DOCUMENT STORE
// =============================================================================

/// A `MemoryStore` with switchable read/write outages.
#[derive(Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub(crate) fn restore(&self) {
        self.fail_reads.store(false, Ordering::SeqCst);
        self.fail_writes.store(false, Ordering::SeqCst);
    }

    pub(crate) fn write_count(&self) -> u64 {
        self.inner.write_count()
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated read outage".to_owned()));
        }
        self.inner.get(collection, key).await
    }

    async fn set_merge(&self, collection: &str, key: &str, fields: Document) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated write outage".to_owned()));
        }
        self.inner.set_merge(collection, key, fields).await
    }
}
