//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::AdminConfig;
use crate::firebase::{FirebaseAuthClient, FirebaseError, FirestoreClient};
use crate::ports::{DocumentStore, IdentityProvider};
use crate::services::{AccessGuard, ComplaintLoader, GuardSettings, SessionTracker};

/// Application state shared across all handlers.
///
/// The console serves a single operator: there is one session tracker, one
/// access guard and one complaint loader for the whole process.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Option<AdminConfig>,
    guard: AccessGuard,
}

impl AppState {
    /// Wire the components over the given collaborators.
    ///
    /// The guard is not started; call [`AppState::start`] from within the
    /// runtime.
    #[must_use]
    pub fn with_collaborators(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        complaints_collection: &str,
        settings: GuardSettings,
    ) -> Self {
        Self::build(None, identity, store, complaints_collection, settings)
    }

    /// Build production state backed by Firebase.
    ///
    /// # Errors
    ///
    /// Returns `FirebaseError` if the HTTP client cannot be created.
    pub fn from_config(config: AdminConfig) -> Result<Self, FirebaseError> {
        let auth = FirebaseAuthClient::new(config.firebase.api_key.clone())?;
        let firestore = FirestoreClient::new(
            auth.clone(),
            config.firebase.project_id.clone(),
            config.firebase.database.clone(),
        );
        let collection = config.complaints_collection.clone();
        let settings = config.guard_settings();

        Ok(Self::build(
            Some(config),
            Arc::new(auth),
            Arc::new(firestore),
            &collection,
            settings,
        ))
    }

    fn build(
        config: Option<AdminConfig>,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        complaints_collection: &str,
        settings: GuardSettings,
    ) -> Self {
        let loader = ComplaintLoader::new(Arc::clone(&store), complaints_collection);
        let session = SessionTracker::new(Arc::clone(&identity));
        let guard = AccessGuard::new(identity, store, loader, session, settings);

        Self {
            inner: Arc::new(AppStateInner { config, guard }),
        }
    }

    /// Start the access guard driver.
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        self.inner.guard.spawn()
    }

    /// Loaded configuration, absent when wired directly over collaborators.
    #[must_use]
    pub fn config(&self) -> Option<&AdminConfig> {
        self.inner.config.as_ref()
    }

    #[must_use]
    pub fn guard(&self) -> &AccessGuard {
        &self.inner.guard
    }

    #[must_use]
    pub fn loader(&self) -> &ComplaintLoader {
        self.inner.guard.loader()
    }

    #[must_use]
    pub fn session(&self) -> &SessionTracker {
        self.inner.guard.session()
    }
}
