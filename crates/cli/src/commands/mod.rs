//! Command implementations.
//!
//! # Environment Variables
//!
//! - `FIXIT_EMAIL` - Account to sign in as
//! - `FIXIT_PASSWORD` - Its password
//! - Firebase settings as for the web console (`FIREBASE_API_KEY`,
//!   `FIREBASE_PROJECT_ID`, ...). `ADMIN_BASE_URL` is optional here.

pub mod access;
pub mod complaints;

use secrecy::SecretString;
use thiserror::Error;

use fixit_admin::config::{AdminConfig, ConfigError};
use fixit_admin::firebase::FirebaseError;
use fixit_admin::services::{
    AccessOutcome, Admission, AuthError, DenialReason, QueryError,
};
use fixit_admin::state::AppState;

/// Base URL assumed when `ADMIN_BASE_URL` is not set.
const DEFAULT_BASE_URL: &str = "http://localhost:3001";

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Firebase client error: {0}")]
    Firebase(#[from] FirebaseError),

    #[error("Sign-in failed: {0}")]
    Auth(#[from] AuthError),

    /// The account signed in but is not an administrator.
    #[error("Access denied: {0}")]
    Denied(DenialReason),

    /// The session changed before the role decision arrived.
    #[error("Sign-in did not complete")]
    Interrupted,

    #[error("{0}")]
    Query(#[from] QueryError),

    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Account the command signs in as.
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl Credentials {
    /// Read `FIXIT_EMAIL` and `FIXIT_PASSWORD`.
    ///
    /// # Errors
    ///
    /// Returns `CliError::MissingEnvVar` if either is unset or empty.
    pub fn from_env() -> Result<Self, CliError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CliError> {
        let read = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or(CliError::MissingEnvVar(key))
        };
        Ok(Self {
            email: read("FIXIT_EMAIL")?,
            password: SecretString::from(read("FIXIT_PASSWORD")?),
        })
    }
}

/// Load the console configuration, defaulting the base URL.
///
/// # Errors
///
/// Returns `CliError::Config` if the Firebase settings are missing or invalid.
pub fn load_config() -> Result<AdminConfig, CliError> {
    dotenvy::dotenv().ok();

    Ok(AdminConfig::from_lookup(|key| {
        std::env::var(key).ok().or_else(|| {
            (key == "ADMIN_BASE_URL").then(|| {
                tracing::debug!("ADMIN_BASE_URL not set, using default");
                DEFAULT_BASE_URL.to_owned()
            })
        })
    })?)
}

/// Sign in through the access guard.
///
/// Returns the admission when admitted, or the denial reason.
///
/// # Errors
///
/// Returns `CliError::Auth` if the credentials are rejected and
/// `CliError::Interrupted` if no decision arrives for this sign-in.
pub async fn sign_in(
    state: &AppState,
    credentials: &Credentials,
) -> Result<Result<Admission, DenialReason>, CliError> {
    tracing::info!("Signing in as {}...", credentials.email);

    match state
        .guard()
        .sign_in(&credentials.email, &credentials.password)
        .await?
    {
        AccessOutcome::Admitted(_) => state
            .guard()
            .admission()
            .map(Ok)
            .ok_or(CliError::Interrupted),
        AccessOutcome::Denied(reason) => Ok(Err(reason)),
        AccessOutcome::Superseded => Err(CliError::Interrupted),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::sync::Arc;

    use super::*;
    use fixit_admin::ports::memory::{InMemoryDocumentStore, InMemoryIdentityProvider};
    use fixit_admin::services::GuardSettings;

    pub(crate) struct Fixture {
        pub provider: Arc<InMemoryIdentityProvider>,
        pub store: Arc<InMemoryDocumentStore>,
        pub state: AppState,
    }

    pub(crate) fn fixture() -> Fixture {
        let provider = Arc::new(InMemoryIdentityProvider::new());
        let store = Arc::new(InMemoryDocumentStore::new());
        let state = AppState::with_collaborators(
            provider.clone(),
            store.clone(),
            "complaints",
            GuardSettings::default(),
        );
        state.start();
        Fixture {
            provider,
            store,
            state,
        }
    }

    pub(crate) fn credentials(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.to_string(),
            password: SecretString::from(password.to_string()),
        }
    }

    #[test]
    fn test_credentials_require_both_values() {
        let err = Credentials::from_lookup(|key| {
            (key == "FIXIT_EMAIL").then(|| "warden@campus.edu".to_string())
        })
        .err()
        .unwrap();
        assert!(matches!(err, CliError::MissingEnvVar("FIXIT_PASSWORD")));

        let creds = Credentials::from_lookup(|key| match key {
            "FIXIT_EMAIL" => Some("warden@campus.edu".to_string()),
            "FIXIT_PASSWORD" => Some("hunter2".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(creds.email, "warden@campus.edu");
    }

    #[tokio::test]
    async fn test_rejected_credentials_are_an_error() {
        let f = fixture();
        f.provider.add_account("warden@campus.edu", "right", "uid-1");

        let err = sign_in(&f.state, &credentials("warden@campus.edu", "wrong"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CliError::Auth(AuthError::Rejected(_))));
    }
}
