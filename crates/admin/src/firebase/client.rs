//! Firebase Authentication client.
//!
//! Holds the signed-in user's tokens in memory and implements the
//! [`IdentityProvider`] port on top of the REST calls in [`super::auth`].

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::{RwLock, broadcast};
use tracing::{info, instrument, warn};

use fixit_core::{Email, Identity};

use super::FirebaseError;
use super::auth::{FirebaseToken, refresh_id_token, sign_in_with_password};
use crate::ports::{IdentityProvider, ProviderError, SESSION_CHANNEL_CAPACITY};

/// Refresh the ID token when it expires within this many seconds.
const REFRESH_WINDOW_SECS: i64 = 300;

/// Firebase Authentication client.
///
/// # Authentication
///
/// Uses ID tokens obtained from email/password sign-in. Tokens are cached in
/// memory and refreshed automatically when close to expiry.
#[derive(Clone)]
pub struct FirebaseAuthClient {
    inner: Arc<FirebaseAuthInner>,
}

struct FirebaseAuthInner {
    http: reqwest::Client,
    api_key: SecretString,
    /// In-memory token cache
    token: RwLock<Option<FirebaseToken>>,
    /// Mirrors `token` for synchronous readers.
    current: Mutex<Option<Identity>>,
    events: broadcast::Sender<Option<Identity>>,
}

impl FirebaseAuthClient {
    /// Create a client with no signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `FirebaseError::Http` if the HTTP client cannot be built.
    pub fn new(api_key: SecretString) -> Result<Self, FirebaseError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("fixit-admin/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let (events, _) = broadcast::channel(SESSION_CHANNEL_CAPACITY);

        Ok(Self {
            inner: Arc::new(FirebaseAuthInner {
                http,
                api_key,
                token: RwLock::new(None),
                current: Mutex::new(None),
                events,
            }),
        })
    }

    /// The shared HTTP client, reused by the Firestore adapter.
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    /// A valid ID token for the signed-in user, refreshed if necessary.
    ///
    /// A refresh the backend rejects ends the session.
    ///
    /// # Errors
    ///
    /// Returns `FirebaseError::NotSignedIn` if nobody is signed in, or the
    /// refresh failure.
    #[instrument(skip(self))]
    pub async fn id_token(&self) -> Result<SecretString, FirebaseError> {
        let token = self
            .inner
            .token
            .read()
            .await
            .clone()
            .ok_or(FirebaseError::NotSignedIn)?;

        if !token.expires_within(REFRESH_WINDOW_SECS) {
            return Ok(token.id_token);
        }

        match refresh_id_token(&self.inner.http, &self.inner.api_key, &token.refresh_token).await
        {
            Ok(fresh) => {
                let id_token = fresh.id_token.clone();
                let mut slot = self.inner.token.write().await;
                // Only store it if the session was not replaced meanwhile.
                if slot.as_ref().is_some_and(|t| t.uid == fresh.uid) {
                    *slot = Some(fresh);
                }
                Ok(id_token)
            }
            Err(err @ FirebaseError::Auth { .. }) => {
                warn!(error = %err, uid = %token.uid, "token refresh rejected, ending session");
                self.end_session(&token.uid).await;
                Err(err)
            }
            Err(err) if !token.is_expired() => {
                // Still usable for a little while; try again next time.
                warn!(error = %err, "token refresh failed, using current token");
                Ok(token.id_token)
            }
            Err(err) => Err(err),
        }
    }

    async fn end_session(&self, uid: &str) {
        let mut slot = self.inner.token.write().await;
        if slot.as_ref().is_some_and(|t| t.uid == uid) {
            *slot = None;
            drop(slot);
            self.publish(None);
        }
    }

    fn publish(&self, identity: Option<Identity>) {
        *self
            .inner
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = identity.clone();
        // No subscribers is fine.
        let _ = self.inner.events.send(identity);
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuthClient {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Identity, ProviderError> {
        let (identity, token) =
            sign_in_with_password(&self.inner.http, &self.inner.api_key, email, password).await?;

        *self.inner.token.write().await = Some(token);
        info!(uid = %identity.id, "firebase sign-in succeeded");
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<(), ProviderError> {
        *self.inner.token.write().await = None;
        self.publish(None);
        Ok(())
    }

    fn current_identity(&self) -> Option<Identity> {
        self.inner
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<Option<Identity>> {
        self.inner.events.subscribe()
    }
}
