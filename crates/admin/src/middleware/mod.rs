//! HTTP middleware stack for admin.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Security headers
//! 4. Session layer (tower-sessions, in-memory store)
//! 5. Auth extractors on guarded handlers

pub mod auth;
pub mod security_headers;
pub mod session;

pub use auth::{
    AdminAuthRejection, OptionalAdmin, RequireAdmin, clear_current_admin, set_current_admin,
};
pub use security_headers::security_headers_middleware;
pub use session::{SESSION_COOKIE_NAME, create_session_layer};
