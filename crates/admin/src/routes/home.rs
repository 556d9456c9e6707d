//! Landing page.

use askama::Template;
use axum::{
    Router,
    response::{Html, IntoResponse},
    routing::get,
};

use crate::filters;
use crate::middleware::OptionalAdmin;
use crate::state::AppState;

/// Landing page template.
#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    signed_in: bool,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(home))
}

/// GET /
async fn home(OptionalAdmin(admission): OptionalAdmin) -> impl IntoResponse {
    let template = HomeTemplate {
        signed_in: admission.is_some(),
    };
    Html(
        template
            .render()
            .unwrap_or_else(|_| String::from("Error rendering template")),
    )
}
