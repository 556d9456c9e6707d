//! Authenticated principals and their stored capabilities.

use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::IdentityId;

/// The role value that grants dashboard access.
pub const ADMIN_ROLE: &str = "admin";

/// An authenticated principal issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Provider uid; also the key of the profile document.
    pub id: IdentityId,
    /// Email the principal signed in with.
    pub email: Email,
}

impl Identity {
    /// Create a new identity.
    #[must_use]
    pub const fn new(id: IdentityId, email: Email) -> Self {
        Self { id, email }
    }

    /// Whether both values refer to the same principal.
    ///
    /// Only the uid is compared; an email change on the provider side does not
    /// make it a different identity.
    #[must_use]
    pub fn same_principal(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Single-valued capability tag stored per identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Grants dashboard access.
    Admin,
    /// Any other stored role (e.g. "student", "staff").
    Other(String),
}

impl Role {
    /// Interpret a stored role string. Matching is exact: `"Admin"` is not
    /// an admin.
    #[must_use]
    pub fn from_stored(value: &str) -> Self {
        if value == ADMIN_ROLE {
            Self::Admin
        } else {
            Self::Other(value.to_owned())
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => f.write_str(ADMIN_ROLE),
            Self::Other(role) => f.write_str(role),
        }
    }
}

/// The part of a user's profile document this system reads.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stored role, absent when the document has no usable `role` field.
    pub role: Option<Role>,
}

impl UserProfile {
    /// Whether this profile grants admin capability.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Some(Role::Admin))
    }
}
