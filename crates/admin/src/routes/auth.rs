//! Authentication route handlers for admin.
//!
//! Credentials go to the access guard, which answers only after the role
//! check for the resulting identity has finished. The browser session is
//! bound to the identity only when the guard admits it.

use askama::Template;
use axum::{
    Form, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use crate::error::AppError;
use crate::filters;
use crate::middleware::{OptionalAdmin, clear_current_admin, set_current_admin};
use crate::models::CurrentAdmin;
use crate::services::{ACCESS_DENIED_NOTICE, AccessOutcome, AuthError};
use crate::state::AppState;

/// Shown when the guard never reached a decision for this sign-in.
pub const SIGN_IN_INTERRUPTED: &str = "Sign-in did not complete. Please try again.";

/// Login page template.
#[derive(Template)]
#[template(path = "auth/login.html")]
struct LoginPageTemplate {
    email: String,
    error: Option<String>,
}

/// Login form submission.
#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
}

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", get(login_page).post(login))
        .route("/auth/logout", post(logout))
}

fn render_login(status: StatusCode, email: String, error: Option<String>) -> Response {
    let template = LoginPageTemplate { email, error };
    (
        status,
        Html(
            template
                .render()
                .unwrap_or_else(|_| String::from("Error rendering template")),
        ),
    )
        .into_response()
}

/// Render the login page, with the pending access notice if any.
///
/// GET /auth/login
async fn login_page(
    State(state): State<AppState>,
    OptionalAdmin(admission): OptionalAdmin,
) -> Response {
    if admission.is_some() {
        return Redirect::to("/dashboard").into_response();
    }
    render_login(StatusCode::OK, String::new(), state.guard().take_notice())
}

/// Submit credentials.
///
/// POST /auth/login
#[instrument(skip_all)]
async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let password = SecretString::from(form.password);
    let email = form.email.trim().to_string();

    match state.guard().sign_in(&email, &password).await {
        Ok(AccessOutcome::Admitted(identity)) => {
            set_current_admin(&session, &CurrentAdmin::from(&identity)).await?;
            info!(uid = %identity.id, "admin signed in");
            Ok(Redirect::to("/dashboard").into_response())
        }
        Ok(AccessOutcome::Denied(reason)) => {
            warn!(%reason, "sign-in refused by role check");
            let notice = state
                .guard()
                .take_notice()
                .unwrap_or_else(|| ACCESS_DENIED_NOTICE.to_string());
            Ok(render_login(StatusCode::FORBIDDEN, email, Some(notice)))
        }
        Ok(AccessOutcome::Superseded) => Ok(render_login(
            StatusCode::CONFLICT,
            email,
            Some(SIGN_IN_INTERRUPTED.to_string()),
        )),
        Err(err) => {
            let status = if matches!(err, AuthError::Unavailable(_)) {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::UNAUTHORIZED
            };
            Ok(render_login(status, email, Some(err.to_string())))
        }
    }
}

/// Sign out and clear the session binding.
///
/// POST /auth/logout
#[instrument(skip_all)]
async fn logout(
    State(state): State<AppState>,
    OptionalAdmin(admission): OptionalAdmin,
    session: Session,
) -> Result<Response, AppError> {
    // Only the bound browser may end the console's session
    if admission.is_some() {
        state.guard().sign_out().await?;
        info!("admin signed out");
    }
    clear_current_admin(&session).await?;
    Ok(Redirect::to("/").into_response())
}
