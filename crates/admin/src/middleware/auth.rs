//! Authentication middleware and extractors for admin.
//!
//! A request is admitted only when the access guard currently admits some
//! identity *and* the browser session is bound to that same identity.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{CurrentAdmin, session_keys};
use crate::services::Admission;
use crate::state::AppState;

/// Extractor that requires an admitted admin.
///
/// If the request is not admitted, returns a redirect to the login page
/// for HTML requests, or 401 Unauthorized for API requests.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAdmin(admission): RequireAdmin,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", admission.identity().email)
/// }
/// ```
pub struct RequireAdmin(pub Admission);

/// Error returned when admin authentication is required but the request is not admitted.
pub enum AdminAuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// Unauthorized response (for API requests).
    Unauthorized,
}

impl IntoResponse for AdminAuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/auth/login").into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AdminAuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AdminAuthRejection::Unauthorized)?;

        bound_admission(session, state)
            .await
            .map(Self)
            .ok_or_else(|| {
                if parts.uri.path().starts_with("/api/") {
                    AdminAuthRejection::Unauthorized
                } else {
                    AdminAuthRejection::RedirectToLogin
                }
            })
    }
}

/// Extractor that optionally gets the admitted admin.
///
/// Unlike `RequireAdmin`, this does not reject the request.
pub struct OptionalAdmin(pub Option<Admission>);

impl FromRequestParts<AppState> for OptionalAdmin {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let admission = match parts.extensions.get::<Session>() {
            Some(session) => bound_admission(session, state).await,
            None => None,
        };

        Ok(Self(admission))
    }
}

/// The guard's admission, if this session is bound to the admitted identity.
async fn bound_admission(session: &Session, state: &AppState) -> Option<Admission> {
    let admin: CurrentAdmin = session
        .get(session_keys::CURRENT_ADMIN)
        .await
        .ok()
        .flatten()?;

    let admission = state.guard().admission()?;
    if admin.is(admission.identity()) {
        Some(admission)
    } else {
        tracing::debug!(uid = %admin.id, "session bound to an identity the guard no longer admits");
        None
    }
}

/// Helper to bind the session to an admitted admin.
///
/// The session id is cycled first so a pre-login cookie never carries the
/// binding.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_admin(
    session: &Session,
    admin: &CurrentAdmin,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_ADMIN, admin).await
}

/// Helper to clear the current admin from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_admin(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
        .await?;
    Ok(())
}
