//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness
//! GET  /health/ready           - Readiness (guard is following the session)
//!
//! GET  /                       - Landing page
//!
//! # Auth (email + password via Firebase, admin role required)
//! GET  /auth/login             - Login page
//! POST /auth/login             - Submit credentials
//! POST /auth/logout            - Sign out
//!
//! # Complaints
//! GET  /dashboard              - Complaint list
//! POST /dashboard/refresh      - Re-run the fetch
//! ```

use axum::{
    Router,
    extract::State,
    http::{StatusCode, Uri},
    routing::get,
};
use tower_http::services::ServeDir;

use crate::error::AppError;
use crate::middleware::{create_session_layer, security_headers_middleware};
use crate::state::AppState;

pub mod auth;
pub mod dashboard;
pub mod home;

/// Directory served under `/static`.
const STATIC_DIR: &str = "crates/admin/static";

/// Build the page routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(home::router())
        .merge(auth::router())
        .merge(dashboard::router())
}

/// Build the application router with health checks, static assets, sessions
/// and security headers. Tracing and Sentry layers are added by the binary.
pub fn app(state: AppState) -> Router {
    let secure = state.config().is_some_and(crate::config::AdminConfig::secure_cookies);

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes())
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .fallback(not_found)
        .layer(create_session_layer(secure))
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .with_state(state)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable until the access guard is following the
/// identity provider's session changes.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.session().is_listening() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
