//! Firebase REST adapters.
//!
//! Implements the two collaborator ports against Google's REST APIs:
//!
//! - [`FirebaseAuthClient`] - Identity Toolkit password sign-in with Secure
//!   Token refresh, implementing [`IdentityProvider`](crate::ports::IdentityProvider)
//! - [`FirestoreClient`] - Cloud Firestore document reads and ordered
//!   queries, implementing [`DocumentStore`](crate::ports::DocumentStore)
//!
//! # Architecture
//!
//! - The ID token lives in memory only; a restart means signing in again
//! - Tokens are refreshed when they expire within five minutes
//! - A rejected refresh ends the session and notifies subscribers
//! - Firestore requests carry the signed-in user's ID token, so the project's
//!   security rules apply exactly as they do for the mobile app

pub mod auth;
pub mod client;
pub mod firestore;
pub mod value;

pub use client::FirebaseAuthClient;
pub use firestore::FirestoreClient;

use thiserror::Error;

use crate::ports::{ProviderError, StoreError};

/// Errors from the Firebase REST APIs.
#[derive(Debug, Error)]
pub enum FirebaseError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be parsed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The Identity Toolkit or Secure Token API refused the request.
    #[error("authentication failed: {code}")]
    Auth {
        /// Error code, e.g. `INVALID_PASSWORD`.
        code: String,
    },

    /// No signed-in user, so there is no ID token to send.
    #[error("not signed in")]
    NotSignedIn,

    /// Firestore refused the read (security rules or an invalid token).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Rate limited.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Any other non-success response.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// A request URL could not be built.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl FirebaseError {
    /// Message safe to show next to the sign-in form.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Auth { code } => auth_code_message(code),
            Self::RateLimited(_) => "Too many attempts. Please wait a moment and try again.",
            _ => "Sign-in is unavailable right now. Please try again.",
        }
    }
}

/// Map an Identity Toolkit error code to a user-facing message.
///
/// Wrong email and wrong password deliberately share a message.
#[must_use]
pub fn auth_code_message(code: &str) -> &'static str {
    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "INVALID_EMAIL" => {
            "Invalid email or password."
        }
        "USER_DISABLED" => "This account has been disabled.",
        "TOO_MANY_ATTEMPTS_TRY_LATER" => {
            "Too many failed attempts. Try again later or reset your password."
        }
        _ => "Sign-in failed. Please try again.",
    }
}

impl From<FirebaseError> for ProviderError {
    fn from(err: FirebaseError) -> Self {
        match &err {
            FirebaseError::Auth { .. } | FirebaseError::RateLimited(_) => {
                Self::Rejected(err.user_message().to_owned())
            }
            _ => Self::Unavailable(err.to_string()),
        }
    }
}

impl From<FirebaseError> for StoreError {
    fn from(err: FirebaseError) -> Self {
        match err {
            FirebaseError::PermissionDenied(message) => Self::PermissionDenied(message),
            FirebaseError::NotSignedIn | FirebaseError::Auth { .. } => {
                Self::PermissionDenied(err.to_string())
            }
            other => Self::Unavailable(other.to_string()),
        }
    }
}
