//! Session middleware configuration for admin.
//!
//! Sessions live in process memory: they only bind a browser to the
//! identity the access guard admitted, and a restart re-runs the role check
//! anyway.

use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

/// Session cookie name for admin.
pub const SESSION_COOKIE_NAME: &str = "fixit_admin_session";

/// Session expiry time in seconds (24 hours of inactivity).
const SESSION_EXPIRY_SECONDS: i64 = 24 * 60 * 60;

/// Create the session layer with an in-memory store.
///
/// `secure` should be true when the console is served over HTTPS.
#[must_use]
pub fn create_session_layer(secure: bool) -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(secure)
        .with_same_site(tower_sessions::cookie::SameSite::Strict)
        .with_http_only(true)
        .with_path("/")
}
