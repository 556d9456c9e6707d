//! Integration tests for the FixIt admin console.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p fixit-integration-tests
//! ```
//!
//! Everything runs in-process: the console is wired over the in-memory
//! identity provider and document store, and HTTP requests go through the
//! router with `tower::ServiceExt::oneshot`.
//!
//! # Test Categories
//!
//! - `access_scenarios` - guard and loader behaviour end to end
//! - `http_flow` - pages, redirects and the session cookie

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tower::ServiceExt;

use fixit_admin::ports::memory::{InMemoryDocumentStore, InMemoryIdentityProvider};
use fixit_admin::ports::{Document, FieldValue};
use fixit_admin::services::{AccessGuard, GuardSettings, GuardSnapshot, ListState};
use fixit_admin::state::AppState;
use fixit_core::Identity;

/// Collection names used by every context.
pub const PROFILES: &str = "users";
pub const COMPLAINTS: &str = "complaints";

/// How long helpers wait for asynchronous state before failing the test.
pub const WAIT: Duration = Duration::from_secs(5);

/// A console wired over in-memory collaborators.
pub struct TestContext {
    pub provider: Arc<InMemoryIdentityProvider>,
    pub store: Arc<InMemoryDocumentStore>,
    pub state: AppState,
    driver: JoinHandle<()>,
}

impl TestContext {
    /// Start a console with no session. Must be called inside a runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::with_provider(InMemoryIdentityProvider::new(), Duration::from_secs(5))
    }

    /// Start a console over a prepared provider, e.g. one holding a
    /// persisted session.
    #[must_use]
    pub fn with_provider(provider: InMemoryIdentityProvider, role_check_timeout: Duration) -> Self {
        Self::with_parts(provider, InMemoryDocumentStore::new(), role_check_timeout)
    }

    /// Start a console over prepared collaborators. The guard starts
    /// immediately, so a persisted session is checked against `store` as
    /// given.
    #[must_use]
    pub fn with_parts(
        provider: InMemoryIdentityProvider,
        store: InMemoryDocumentStore,
        role_check_timeout: Duration,
    ) -> Self {
        let provider = Arc::new(provider);
        let store = Arc::new(store);
        let state = AppState::with_collaborators(
            provider.clone(),
            store.clone(),
            COMPLAINTS,
            GuardSettings {
                profiles_collection: PROFILES.to_string(),
                role_check_timeout,
            },
        );
        let driver = state.start();
        Self {
            provider,
            store,
            state,
            driver,
        }
    }

    #[must_use]
    pub fn guard(&self) -> &AccessGuard {
        self.state.guard()
    }

    /// Register an account whose profile carries `role`.
    pub fn account(&self, email: &str, password: &str, uid: &str, role: &str) -> Identity {
        let identity = self.provider.add_account(email, password, uid);
        self.store.put_profile(PROFILES, uid, role);
        identity
    }

    /// Wait until the guard snapshot satisfies `done`.
    ///
    /// # Panics
    ///
    /// Panics if the condition does not hold within [`WAIT`].
    pub async fn wait_for_guard(&self, done: impl Fn(&GuardSnapshot) -> bool) -> GuardSnapshot {
        let mut rx = self.guard().subscribe();
        let snapshot = tokio::time::timeout(WAIT, rx.wait_for(|s| done(s)))
            .await
            .expect("guard did not reach the expected state")
            .expect("guard stopped");
        snapshot.clone()
    }

    /// Wait until the complaint list satisfies `done`.
    ///
    /// # Panics
    ///
    /// Panics if the condition does not hold within [`WAIT`].
    pub async fn wait_for_list(&self, done: impl Fn(&ListState) -> bool) -> ListState {
        let mut rx = self.state.loader().subscribe();
        let state = tokio::time::timeout(WAIT, rx.wait_for(|s| done(s)))
            .await
            .expect("list did not reach the expected state")
            .expect("loader dropped");
        state.clone()
    }

    /// A browser with its own cookie jar.
    #[must_use]
    pub fn browser(&self) -> Browser {
        Browser {
            app: fixit_admin::routes::app(self.state.clone()),
            cookie: None,
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// A complaint document as the mobile app writes it.
#[must_use]
pub fn complaint(id: &str, title: &str, status: &str, created_at: Option<DateTime<Utc>>) -> Document {
    let doc = Document::new(id)
        .with_field("title", FieldValue::String(title.to_string()))
        .with_field("description", FieldValue::String(format!("{title} details")))
        .with_field("address", FieldValue::String("Hostel B, Room 12".to_string()))
        .with_field("status", FieldValue::String(status.to_string()));
    match created_at {
        Some(ts) => doc.with_field("createdAt", FieldValue::Timestamp(ts)),
        None => doc,
    }
}

/// A rendered response.
#[derive(Debug)]
pub struct Page {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

/// Drives the router like a browser, carrying the session cookie.
pub struct Browser {
    app: Router,
    cookie: Option<String>,
}

impl Browser {
    /// GET `uri`.
    ///
    /// # Panics
    ///
    /// Panics if the router fails, which it never does for valid requests.
    pub async fn get(&mut self, uri: &str) -> Page {
        let request = self.request("GET", uri).body(Body::empty()).expect("valid request");
        self.send(request).await
    }

    /// POST an urlencoded form to `uri`.
    ///
    /// # Panics
    ///
    /// Panics if the router fails, which it never does for valid requests.
    pub async fn post_form(&mut self, uri: &str, form: &str) -> Page {
        let request = self
            .request("POST", uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .expect("valid request");
        self.send(request).await
    }

    /// Whether the browser currently holds a session cookie.
    #[must_use]
    pub const fn has_cookie(&self) -> bool {
        self.cookie.is_some()
    }

    fn request(&self, method: &str, uri: &str) -> axum::http::request::Builder {
        let builder = Request::builder().method(method).uri(uri);
        match &self.cookie {
            Some(cookie) => builder.header(header::COOKIE, cookie),
            None => builder,
        }
    }

    async fn send(&mut self, request: Request<Body>) -> Page {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        for set_cookie in response.headers().get_all(header::SET_COOKIE) {
            let Ok(set_cookie) = set_cookie.to_str() else {
                continue;
            };
            let pair = set_cookie.split(';').next().unwrap_or_default().trim();
            let expired = set_cookie.to_ascii_lowercase().contains("max-age=0");
            let empty = pair.ends_with('=');
            self.cookie = (!expired && !empty).then(|| pair.to_string());
        }

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body is readable");

        Page {
            status,
            location,
            body: String::from_utf8_lossy(&body).into_owned(),
        }
    }
}
