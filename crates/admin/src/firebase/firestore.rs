//! Cloud Firestore REST client.
//!
//! Reads run with the signed-in user's ID token, so the project's security
//! rules decide what the console may see.
//!
//! Collection queries carry no `orderBy`: Firestore drops every document
//! that lacks the ordered field, so ordering happens after the read.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use super::FirebaseError;
use super::client::FirebaseAuthClient;
use super::value::RawDocument;
use crate::ports::{Document, DocumentStore, SortDirection, StoreError, sort_documents};

/// Firestore REST API root.
const FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com/v1/";

/// Cloud Firestore client for one database.
#[derive(Clone)]
pub struct FirestoreClient {
    auth: FirebaseAuthClient,
    project_id: String,
    database: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunQueryRequest<'a> {
    structured_query: StructuredQuery<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StructuredQuery<'a> {
    from: [CollectionSelector<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CollectionSelector<'a> {
    collection_id: &'a str,
}

impl<'a> RunQueryRequest<'a> {
    /// Every document of one collection.
    const fn collection(collection_id: &'a str) -> Self {
        Self {
            structured_query: StructuredQuery {
                from: [CollectionSelector { collection_id }],
            },
        }
    }
}

/// One element of the `runQuery` response stream.
#[derive(Deserialize)]
struct RunQueryItem {
    #[serde(default)]
    document: Option<RawDocument>,
}

impl FirestoreClient {
    #[must_use]
    pub fn new(
        auth: FirebaseAuthClient,
        project_id: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            project_id: project_id.into(),
            database: database.into(),
        }
    }

    /// URL of `documents/{segments...}` in this database.
    fn documents_url(&self, segments: &[&str]) -> Result<Url, FirebaseError> {
        let mut url = Url::parse(FIRESTORE_ENDPOINT)?;
        url.path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend([
                "projects",
                self.project_id.as_str(),
                "databases",
                self.database.as_str(),
                "documents",
            ])
            .extend(segments);
        Ok(url)
    }

    #[instrument(skip(self))]
    async fn fetch_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, FirebaseError> {
        let url = self.documents_url(&[collection, id])?;
        let token = self.auth.id_token().await?;

        let response = self
            .auth
            .http()
            .get(url)
            .bearer_auth(token.expose_secret())
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("document does not exist");
            return Ok(None);
        }
        let response = check_status(response).await?;
        let raw: RawDocument = response.json().await?;
        Ok(Some(raw.into_document()))
    }

    #[instrument(skip(self))]
    async fn run_ordered_query(
        &self,
        collection: &str,
        sort_field: &str,
        direction: SortDirection,
    ) -> Result<Vec<Document>, FirebaseError> {
        // `documents:runQuery` is a custom method on the documents root.
        let mut url = self.documents_url(&[])?;
        let path = format!("{}:runQuery", url.path());
        url.set_path(&path);

        let token = self.auth.id_token().await?;
        let body = RunQueryRequest::collection(collection);

        let response = self
            .auth
            .http()
            .post(url)
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let items: Vec<RunQueryItem> = response.json().await?;
        let mut documents: Vec<Document> = items
            .into_iter()
            .filter_map(|item| item.document.map(RawDocument::into_document))
            .collect();
        debug!(count = documents.len(), "query returned");
        sort_documents(&mut documents, sort_field, direction);
        Ok(documents)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, FirebaseError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        return Err(FirebaseError::RateLimited(retry_after));
    }

    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(FirebaseError::PermissionDenied(text));
    }

    Err(FirebaseError::Status {
        status: status.as_u16(),
        message: text,
    })
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self.fetch_document(collection, id).await?)
    }

    async fn query_ordered(
        &self,
        collection: &str,
        sort_field: &str,
        direction: SortDirection,
    ) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .run_ordered_query(collection, sort_field, direction)
            .await?)
    }
}
