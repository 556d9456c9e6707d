//! Error taxonomy of the access flow.
//!
//! Collaborator failures are converted into one of these kinds at the
//! component boundary; none of them reach the view layer as a panic or an
//! unhandled error. All kinds are `Clone` so they can live inside published
//! state snapshots.

use std::time::Duration;

use thiserror::Error;

use crate::ports::{ProviderError, StoreError};

/// Sign-in failed. Shown to the user next to the credential form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The email field does not hold an address.
    #[error("Enter a valid email address.")]
    InvalidEmail(#[from] fixit_core::EmailError),

    /// The password field is empty.
    #[error("Enter your password.")]
    MissingPassword,

    /// The identity provider rejected the credentials.
    #[error("{0}")]
    Rejected(String),

    /// The identity provider could not be reached.
    #[error("Sign-in is unavailable right now. Please try again.")]
    Unavailable(String),
}

impl From<ProviderError> for AuthError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Rejected(message) => Self::Rejected(message),
            ProviderError::Unavailable(message) => Self::Unavailable(message),
        }
    }
}

/// The profile read behind a role check failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileLookupError {
    /// The store refused or failed the read.
    #[error("profile lookup failed: {0}")]
    Store(#[from] StoreError),

    /// The read did not finish within the role-check timeout.
    #[error("profile lookup timed out after {0:?}")]
    TimedOut(Duration),
}

/// Fetching the complaint list failed. Rendered inline with a retry control.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The store could not be reached.
    #[error("Could not load complaints: {0}")]
    Unavailable(String),

    /// The signed-in account may not read complaints.
    #[error("You do not have permission to read complaints.")]
    PermissionDenied(String),

    /// The admission the load was started under is no longer current.
    #[error("Your session ended. Sign in again to view complaints.")]
    SessionEnded,
}

impl From<StoreError> for QueryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PermissionDenied(message) => Self::PermissionDenied(message),
            StoreError::Unavailable(message) => Self::Unavailable(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_message_is_passed_through() {
        let err = AuthError::from(ProviderError::Rejected("Wrong password.".to_string()));
        assert_eq!(err.to_string(), "Wrong password.");
    }

    #[test]
    fn test_unavailable_hides_detail() {
        let err = AuthError::from(ProviderError::Unavailable("dns failure".to_string()));
        assert!(!err.to_string().contains("dns"));
    }

    #[test]
    fn test_query_error_from_store_error() {
        assert_eq!(
            QueryError::from(StoreError::PermissionDenied("rules".to_string())),
            QueryError::PermissionDenied("rules".to_string())
        );
        assert_eq!(
            QueryError::from(StoreError::Unavailable("503".to_string())).to_string(),
            "Could not load complaints: 503"
        );
    }
}
