//! Session-related types for admin authentication.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use fixit_core::{Email, Identity, IdentityId};

/// Session-stored admin identity.
///
/// Binds a browser session to the identity the access guard admitted. The
/// guard remains the authority; this only says which identity the browser
/// signed in as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentAdmin {
    /// Provider uid.
    pub id: IdentityId,
    /// Email the admin signed in with.
    pub email: Email,
}

impl CurrentAdmin {
    /// Whether this binding refers to the given identity.
    #[must_use]
    pub fn is(&self, identity: &Identity) -> bool {
        self.id == identity.id
    }
}

impl From<&Identity> for CurrentAdmin {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            email: identity.email.clone(),
        }
    }
}

/// Session keys for admin authentication data.
pub mod keys {
    /// Key for storing the current logged-in admin.
    pub const CURRENT_ADMIN: &str = "current_admin";
}
