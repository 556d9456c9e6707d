//! In-memory collaborators for tests.
//!
//! Both adapters count the calls made against them so tests can assert the
//! "exactly one read" and "no fetch" properties, and both can be told to
//! fail or to hold a read until the test releases it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Notify, broadcast};

use fixit_core::{Email, Identity, IdentityId};

use super::{
    Document, DocumentStore, FieldValue, IdentityProvider, ProviderError,
    SESSION_CHANNEL_CAPACITY, SortDirection, StoreError, sort_documents,
};

/// Message returned for any credential mismatch.
pub const INVALID_CREDENTIALS: &str = "Invalid email or password.";

#[derive(Clone)]
struct Account {
    password: String,
    identity: Identity,
}

/// Identity provider backed by a fixed account table.
pub struct InMemoryIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    current: Mutex<Option<Identity>>,
    events: broadcast::Sender<Option<Identity>>,
    sign_in_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIdentityProvider {
    /// Create a provider with no accounts and no session.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(SESSION_CHANNEL_CAPACITY);
        Self {
            accounts: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            events,
            sign_in_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
        }
    }

    /// Register an account and return the identity it signs in as.
    ///
    /// # Panics
    ///
    /// Panics if `email` is not a valid address.
    pub fn add_account(&self, email: &str, password: &str, uid: &str) -> Identity {
        let email = Email::parse(email).expect("test account email must be valid");
        let identity = Identity::new(IdentityId::new(uid), email.clone());
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                email.into_inner(),
                Account {
                    password: password.to_owned(),
                    identity: identity.clone(),
                },
            );
        identity
    }

    /// Start with a session already signed in, as if rehydrated from the
    /// provider's own persistence.
    #[must_use]
    pub fn with_session(self, identity: Identity) -> Self {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(identity);
        self
    }

    /// Push a session change from the provider side (e.g. token
    /// invalidation, or a sign-in performed elsewhere).
    pub fn emit(&self, identity: Option<Identity>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = identity.clone();
        let _ = self.events.send(identity);
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Number of `sign_in` calls so far.
    #[must_use]
    pub fn sign_in_calls(&self) -> usize {
        self.sign_in_calls.load(AtomicOrdering::SeqCst)
    }

    /// Number of `sign_out` calls so far.
    #[must_use]
    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Identity, ProviderError> {
        self.sign_in_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let account = self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(email.as_str())
            .cloned();

        match account {
            Some(account) if account.password == password.expose_secret() => {
                self.emit(Some(account.identity.clone()));
                Ok(account.identity)
            }
            _ => Err(ProviderError::Rejected(INVALID_CREDENTIALS.to_owned())),
        }
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.sign_out_calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.emit(None);
        Ok(())
    }

    fn current_identity(&self) -> Option<Identity> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<Option<Identity>> {
        self.events.subscribe()
    }
}

/// Document store holding collections in memory.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
    failures: Mutex<HashMap<String, StoreError>>,
    holds: Mutex<HashMap<(String, String), Arc<Notify>>>,
    query_hold: Mutex<Option<Arc<Notify>>>,
    get_calls: AtomicUsize,
    query_calls: AtomicUsize,
}

impl InMemoryDocumentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document.
    pub fn put(&self, collection: &str, document: Document) {
        let mut collections = self
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let docs = collections.entry(collection.to_owned()).or_default();
        docs.retain(|existing| existing.id != document.id);
        docs.push(document);
    }

    /// Store a profile document with the given role.
    pub fn put_profile(&self, collection: &str, uid: &str, role: &str) {
        self.put(
            collection,
            Document::new(uid).with_field("role", FieldValue::String(role.to_owned())),
        );
    }

    /// Make every read of `collection` fail with `error`.
    pub fn fail_collection(&self, collection: &str, error: StoreError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(collection.to_owned(), error);
    }

    /// Stop failing reads of `collection`.
    pub fn heal_collection(&self, collection: &str) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(collection);
    }

    /// Hold reads of one document until the returned handle is notified.
    pub fn hold_document(&self, collection: &str, id: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.holds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((collection.to_owned(), id.to_owned()), Arc::clone(&notify));
        notify
    }

    /// Hold every ordered query until the returned handle is notified.
    pub fn hold_queries(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.query_hold.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::clone(&notify));
        notify
    }

    /// Number of `get_document` calls so far.
    #[must_use]
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(AtomicOrdering::SeqCst)
    }

    /// Number of `query_ordered` calls so far.
    #[must_use]
    pub fn query_calls(&self) -> usize {
        self.query_calls.load(AtomicOrdering::SeqCst)
    }

    fn failure(&self, collection: &str) -> Option<StoreError> {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .cloned()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        self.get_calls.fetch_add(1, AtomicOrdering::SeqCst);

        let hold = self
            .holds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(collection.to_owned(), id.to_owned()))
            .cloned();
        if let Some(hold) = hold {
            hold.notified().await;
        }

        if let Some(error) = self.failure(collection) {
            return Err(error);
        }

        Ok(self
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id).cloned()))
    }

    async fn query_ordered(
        &self,
        collection: &str,
        sort_field: &str,
        direction: SortDirection,
    ) -> Result<Vec<Document>, StoreError> {
        self.query_calls.fetch_add(1, AtomicOrdering::SeqCst);

        let hold = self
            .query_hold
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hold) = hold {
            hold.notified().await;
        }

        if let Some(error) = self.failure(collection) {
            return Err(error);
        }

        let mut docs = self
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .cloned()
            .unwrap_or_default();

        sort_documents(&mut docs, sort_field, direction);
        Ok(docs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_provider_rejects_wrong_password() {
        let provider = InMemoryIdentityProvider::new();
        provider.add_account("admin@campus.edu", "hunter22", "uid-admin");

        let email = Email::parse("admin@campus.edu").unwrap();
        let result = provider
            .sign_in(&email, &SecretString::from("wrong"))
            .await;

        assert_eq!(
            result,
            Err(ProviderError::Rejected(INVALID_CREDENTIALS.to_owned()))
        );
        assert_eq!(provider.current_identity(), None);
    }

    #[tokio::test]
    async fn test_provider_broadcasts_sign_in_and_out() {
        let provider = InMemoryIdentityProvider::new();
        let identity = provider.add_account("admin@campus.edu", "hunter22", "uid-admin");
        let mut rx = provider.subscribe();

        let email = Email::parse("admin@campus.edu").unwrap();
        provider
            .sign_in(&email, &SecretString::from("hunter22"))
            .await
            .unwrap();
        provider.sign_out().await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), Some(identity));
        assert_eq!(rx.recv().await.unwrap(), None);
        assert_eq!(provider.sign_out_calls(), 1);
    }

    #[tokio::test]
    async fn test_store_counts_and_fails_reads() {
        let store = InMemoryDocumentStore::new();
        store.put_profile("users", "u1", "admin");

        assert!(store.get_document("users", "u1").await.unwrap().is_some());
        assert!(store.get_document("users", "u2").await.unwrap().is_none());

        store.fail_collection("users", StoreError::Unavailable("offline".to_string()));
        assert!(store.get_document("users", "u1").await.is_err());
        assert_eq!(store.get_calls(), 3);
    }
}
