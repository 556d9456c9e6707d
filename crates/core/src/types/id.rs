//! Newtype IDs for type-safe document references.
//!
//! Identity-provider uids and document-store ids are opaque strings. The
//! `define_id!` macro wraps them so an identity id can never be passed where
//! a complaint id is expected.

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use fixit_core::define_id;
/// define_id!(BuildingId);
/// define_id!(RoomId);
///
/// let building = BuildingId::new("north-hall");
/// let room = RoomId::new("north-hall");
/// assert_eq!(building.as_str(), room.as_str());
///
/// // These are different types, so this won't compile:
/// // let _: BuildingId = room;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the underlying string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Identity-provider uid (also the key of the user's profile document).
define_id!(IdentityId);
// Document id of a complaint record.
define_id!(ComplaintId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_matches_inner() {
        let id = IdentityId::new("uid-123");
        assert_eq!(id.to_string(), "uid-123");
        assert_eq!(id.as_str(), "uid-123");
    }

    #[test]
    fn test_id_serializes_transparently() {
        let id = ComplaintId::from("c-1");
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, "\"c-1\"");
    }
}
