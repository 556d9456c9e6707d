//! Collaborator ports: the identity provider and the document store.
//!
//! Everything the console knows about authentication and storage goes
//! through these two traits. Production uses the Firebase adapters in
//! [`crate::firebase`]; tests use the in-memory adapters in [`memory`].
//!
//! Adapters map their failures into [`ProviderError`] and [`StoreError`] so
//! the services above only ever see these two shapes.

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use thiserror::Error;
use tokio::sync::broadcast;

use fixit_core::{Email, Identity};

/// Capacity of provider change channels. Lagging subscribers re-read
/// [`IdentityProvider::current_identity`].
pub const SESSION_CHANNEL_CAPACITY: usize = 16;

/// Errors reported by an identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Credentials were rejected. The message is safe to show to the user.
    #[error("{0}")]
    Rejected(String),

    /// The provider could not be reached or answered unexpectedly.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Errors reported by a document store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The caller is not allowed to read the collection or document.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The store could not be reached or answered unexpectedly.
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

/// Sort direction for ordered queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// A typed field value read from a document.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Array(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// The string payload, if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The timestamp payload. RFC 3339 strings are accepted too, since older
    /// records stored dates as text.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            Self::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|ts| ts.with_timezone(&Utc)),
            _ => None,
        }
    }
}

/// A raw record as returned by the document store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    /// Document id within its collection.
    pub id: String,
    /// Top-level fields.
    pub fields: BTreeMap<String, FieldValue>,
}

impl Document {
    /// Create an empty document.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Look up a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Look up a string field.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }
}

/// Stable-sort documents by a timestamp field. Documents without a readable
/// timestamp in that field trail the others in their original order.
pub fn sort_documents(documents: &mut [Document], sort_field: &str, direction: SortDirection) {
    documents.sort_by(|a, b| {
        let a = a.get(sort_field).and_then(FieldValue::as_timestamp);
        let b = b.get(sort_field).and_then(FieldValue::as_timestamp);
        match (a, b) {
            (Some(a), Some(b)) => match direction {
                SortDirection::Ascending => a.cmp(&b),
                SortDirection::Descending => b.cmp(&a),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

/// External identity provider: credential exchange, sign-out and session
/// change notifications.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange credentials for an identity. On success the provider also
    /// broadcasts `Some(identity)` to subscribers.
    async fn sign_in(&self, email: &Email, password: &SecretString)
    -> Result<Identity, ProviderError>;

    /// End the current session. Subscribers receive `None`.
    async fn sign_out(&self) -> Result<(), ProviderError>;

    /// The identity the provider currently considers signed in, including a
    /// session it rehydrated on startup.
    fn current_identity(&self) -> Option<Identity>;

    /// Subscribe to session changes in emission order. Dropping the receiver
    /// unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<Option<Identity>>;
}

/// External document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document; `Ok(None)` when it does not exist.
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError>;

    /// Read a whole collection ordered by one field. Documents lacking the
    /// field are still returned, after the ordered ones.
    async fn query_ordered(
        &self,
        collection: &str,
        sort_field: &str,
        direction: SortDirection,
    ) -> Result<Vec<Document>, StoreError>;
}
