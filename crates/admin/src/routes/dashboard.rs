//! Complaint dashboard.

use std::time::Duration;

use askama::Template;
use axum::{
    Router,
    extract::State,
    response::{Html, IntoResponse, Redirect},
    routing::{get, post},
};
use tracing::{debug, instrument};

use crate::filters;
use crate::middleware::RequireAdmin;
use crate::models::ComplaintView;
use crate::services::{ListState, QueryError};
use crate::state::AppState;

/// How long a page render waits for an outstanding fetch before showing the
/// loading state.
const RENDER_WAIT: Duration = Duration::from_secs(10);

/// What the list area shows.
enum ListView {
    Loading,
    Empty,
    Failed(String),
    Complaints(Vec<ComplaintView>),
}

/// Dashboard page template.
#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    email: String,
    /// Reload the page while the fetch is outstanding.
    auto_refresh: bool,
    list: ListView,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/dashboard/refresh", post(refresh))
}

/// Complaint list.
///
/// GET /dashboard
#[instrument(skip_all)]
async fn dashboard(
    State(state): State<AppState>,
    RequireAdmin(admission): RequireAdmin,
) -> impl IntoResponse {
    let loader = state.loader();

    let list = match loader.state() {
        // Start or join the fetch; a failure is published as `Failed`
        ListState::Idle | ListState::Loading => {
            match tokio::time::timeout(RENDER_WAIT, loader.load(&admission)).await {
                Ok(Ok(complaints)) => complaints_view(&complaints),
                Ok(Err(err)) => ListView::Failed(err.to_string()),
                Err(_) => {
                    debug!("complaint fetch still running, rendering loading state");
                    ListView::Loading
                }
            }
        }
        ListState::Loaded(complaints) => complaints_view(&complaints),
        ListState::Failed(err) => ListView::Failed(err.to_string()),
    };

    let template = DashboardTemplate {
        email: admission.identity().email.to_string(),
        auto_refresh: matches!(list, ListView::Loading),
        list,
    };
    Html(
        template
            .render()
            .unwrap_or_else(|_| String::from("Error rendering template")),
    )
}

/// Re-run the complaint fetch.
///
/// POST /dashboard/refresh
#[instrument(skip_all)]
async fn refresh(
    State(state): State<AppState>,
    RequireAdmin(admission): RequireAdmin,
) -> impl IntoResponse {
    match state.loader().load(&admission).await {
        Ok(complaints) => debug!(count = complaints.len(), "complaints refreshed"),
        // Published as `Failed`; the dashboard shows it
        Err(QueryError::SessionEnded) => return Redirect::to("/auth/login"),
        Err(_) => {}
    }
    Redirect::to("/dashboard")
}

fn complaints_view(complaints: &[fixit_core::Complaint]) -> ListView {
    if complaints.is_empty() {
        ListView::Empty
    } else {
        ListView::Complaints(complaints.iter().map(ComplaintView::from).collect())
    }
}
