//! Complaint List Loader.
//!
//! Fetches the complaint collection for an admitted session, maps raw
//! documents into [`Complaint`]s and publishes the result as a [`ListState`].
//! At most one fetch is outstanding at a time; concurrent callers join it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use fixit_core::{Complaint, ComplaintId, ComplaintStatus, sort_newest_first};

use super::access::Admission;
use super::error::QueryError;
use crate::ports::{Document, DocumentStore, FieldValue, SortDirection};

/// Field the collection is ordered by.
pub const CREATED_AT_FIELD: &str = "createdAt";

type LoadResult = Result<Arc<[Complaint]>, QueryError>;

/// Observable state of the complaint list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ListState {
    /// Nothing loaded for the current session.
    #[default]
    Idle,
    /// A fetch is outstanding.
    Loading,
    /// The most recent fetch succeeded.
    Loaded(Arc<[Complaint]>),
    /// The most recent fetch failed; the view offers a retry.
    Failed(QueryError),
}

struct InFlight {
    generation: u64,
    fetch: Shared<BoxFuture<'static, LoadResult>>,
}

struct LoaderInner {
    store: Arc<dyn DocumentStore>,
    collection: String,
    state: watch::Sender<ListState>,
    in_flight: Mutex<Option<InFlight>>,
    generation: AtomicU64,
}

/// Loads the complaint list on behalf of an admitted session.
#[derive(Clone)]
pub struct ComplaintLoader {
    inner: Arc<LoaderInner>,
}

impl ComplaintLoader {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        let (state, _) = watch::channel(ListState::Idle);
        Self {
            inner: Arc::new(LoaderInner {
                store,
                collection: collection.into(),
                state,
                in_flight: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Current list state.
    #[must_use]
    pub fn state(&self) -> ListState {
        self.inner.state.borrow().clone()
    }

    /// Watch list state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ListState> {
        self.inner.state.subscribe()
    }

    /// Whether a fetch is outstanding.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        let generation = self.generation();
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|in_flight| in_flight.generation == generation)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Fetch the list, or join the fetch already in flight.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::SessionEnded`] if `admission` predates the last
    /// [`ComplaintLoader::reset`], otherwise whatever the store reported.
    #[instrument(skip_all, fields(uid = %admission.identity().id))]
    pub async fn load(&self, admission: &Admission) -> LoadResult {
        let fetch = {
            let mut in_flight = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let generation = self.generation();
            if admission.generation() != generation {
                debug!("refusing load for an admission from a previous session");
                return Err(QueryError::SessionEnded);
            }

            match in_flight.as_ref() {
                Some(current) if current.generation == generation => {
                    debug!("joining in-flight complaint fetch");
                    current.fetch.clone()
                }
                _ => {
                    let fetch = fetch(Arc::clone(&self.inner), generation)
                        .boxed()
                        .shared();
                    *in_flight = Some(InFlight {
                        generation,
                        fetch: fetch.clone(),
                    });
                    self.inner.state.send_replace(ListState::Loading);
                    fetch
                }
            }
        };
        fetch.await
    }

    /// Drop the list and invalidate any fetch still in flight.
    pub fn reset(&self) {
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        *in_flight = None;
        self.inner.state.send_if_modified(|state| {
            if *state == ListState::Idle {
                false
            } else {
                *state = ListState::Idle;
                true
            }
        });
    }
}

async fn fetch(inner: Arc<LoaderInner>, generation: u64) -> LoadResult {
    let result = inner
        .store
        .query_ordered(&inner.collection, CREATED_AT_FIELD, SortDirection::Descending)
        .await
        .map(|documents| {
            let mut complaints: Vec<Complaint> =
                documents.iter().map(complaint_from_document).collect();
            sort_newest_first(&mut complaints);
            Arc::<[Complaint]>::from(complaints)
        })
        .map_err(QueryError::from);

    let mut in_flight = inner
        .in_flight
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if inner.generation.load(Ordering::SeqCst) != generation {
        debug!("discarding complaint fetch from a previous session");
        return Err(QueryError::SessionEnded);
    }
    *in_flight = None;

    match &result {
        Ok(complaints) => {
            info!(count = complaints.len(), "complaints loaded");
            inner.state.send_replace(ListState::Loaded(Arc::clone(complaints)));
        }
        Err(err) => {
            error!(error = %err, "complaint fetch failed");
            inner.state.send_replace(ListState::Failed(err.clone()));
        }
    }
    result
}

fn text_field(document: &Document, name: &str) -> String {
    document.get_str(name).unwrap_or_default().to_owned()
}

/// Map a raw complaint document.
#[must_use]
pub fn complaint_from_document(document: &Document) -> Complaint {
    let status = match document.get_str("status") {
        Some(raw) => ComplaintStatus::parse(raw).unwrap_or_else(|| {
            warn!(id = %document.id, status = raw, "unknown complaint status, showing as pending");
            ComplaintStatus::Pending
        }),
        None => {
            warn!(id = %document.id, "complaint has no status, showing as pending");
            ComplaintStatus::Pending
        }
    };

    Complaint {
        id: ComplaintId::new(document.id.clone()),
        title: text_field(document, "title"),
        description: text_field(document, "description"),
        image_url: document
            .get_str("imageUrl")
            .filter(|url| !url.trim().is_empty())
            .map(str::to_owned),
        address: text_field(document, "address"),
        status,
        created_at: document.get(CREATED_AT_FIELD).and_then(FieldValue::as_timestamp),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ports::StoreError;
    use crate::ports::memory::InMemoryDocumentStore;
    use chrono::{TimeZone, Utc};
    use fixit_core::{Email, Identity, IdentityId};

    fn admission(loader: &ComplaintLoader) -> Admission {
        Admission::new(
            Identity::new(
                IdentityId::new("uid-admin"),
                Email::parse("admin@campus.edu").unwrap(),
            ),
            loader.generation(),
        )
    }

    fn complaint_doc(id: &str, day: Option<u32>) -> Document {
        let mut doc = Document::new(id)
            .with_field("title", FieldValue::String(format!("Issue {id}")))
            .with_field("address", FieldValue::String("Dorm B".to_string()))
            .with_field("status", FieldValue::String("Pending".to_string()));
        if let Some(day) = day {
            doc = doc.with_field(
                CREATED_AT_FIELD,
                FieldValue::Timestamp(Utc.with_ymd_and_hms(2024, 5, day, 8, 0, 0).unwrap()),
            );
        }
        doc
    }

    fn seeded_store() -> Arc<InMemoryDocumentStore> {
        let store = Arc::new(InMemoryDocumentStore::new());
        store.put("complaints", complaint_doc("missing", None));
        store.put("complaints", complaint_doc("t3", Some(3)));
        store.put("complaints", complaint_doc("t1", Some(1)));
        store.put("complaints", complaint_doc("t2", Some(2)));
        store
    }

    #[test]
    fn test_mapping_tolerates_sparse_documents() {
        let complaint = complaint_from_document(
            &Document::new("c1")
                .with_field("status", FieldValue::String("in_progress".to_string()))
                .with_field(
                    CREATED_AT_FIELD,
                    FieldValue::String("2024-03-01T09:30:00Z".to_string()),
                )
                .with_field("imageUrl", FieldValue::String(String::new())),
        );

        assert_eq!(complaint.title, "");
        assert_eq!(complaint.status, ComplaintStatus::InProgress);
        assert_eq!(complaint.image_url, None);
        assert!(complaint.created_at.is_some());
    }

    #[test]
    fn test_mapping_defaults_unknown_status_to_pending() {
        let complaint = complaint_from_document(
            &Document::new("c1").with_field("status", FieldValue::String("closed".to_string())),
        );
        assert_eq!(complaint.status, ComplaintStatus::Pending);

        let complaint = complaint_from_document(
            &Document::new("c2").with_field(CREATED_AT_FIELD, FieldValue::Integer(3)),
        );
        assert_eq!(complaint.status, ComplaintStatus::Pending);
        assert_eq!(complaint.created_at, None);
    }

    #[tokio::test]
    async fn test_load_sorts_newest_first_with_missing_last() {
        let loader = ComplaintLoader::new(seeded_store(), "complaints");

        let complaints = loader.load(&admission(&loader)).await.unwrap();

        let order: Vec<&str> = complaints.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec!["t3", "t2", "t1", "missing"]);
        assert_eq!(loader.state(), ListState::Loaded(complaints));
        assert!(!loader.is_busy());
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_fetch() {
        let store = seeded_store();
        let release = store.hold_queries();
        let loader = ComplaintLoader::new(store.clone(), "complaints");
        let admission = admission(&loader);

        let (first, second, ()) = tokio::join!(
            loader.load(&admission),
            loader.load(&admission),
            async { release.notify_one() },
        );

        assert_eq!(store.query_calls(), 1);
        assert_eq!(first.unwrap(), second.unwrap());
    }

    #[tokio::test]
    async fn test_busy_while_fetch_outstanding() {
        let store = seeded_store();
        let release = store.hold_queries();
        let loader = ComplaintLoader::new(store.clone(), "complaints");
        let admission = admission(&loader);

        let task = tokio::spawn({
            let loader = loader.clone();
            let admission = admission.clone();
            async move { loader.load(&admission).await }
        });
        while store.query_calls() == 0 {
            tokio::task::yield_now().await;
        }

        assert!(loader.is_busy());
        assert_eq!(loader.state(), ListState::Loading);

        release.notify_one();
        assert!(task.await.unwrap().is_ok());
        assert!(!loader.is_busy());
    }

    #[tokio::test]
    async fn test_failure_is_published_and_retry_recovers() {
        let store = seeded_store();
        store.fail_collection("complaints", StoreError::Unavailable("offline".to_string()));
        let loader = ComplaintLoader::new(store.clone(), "complaints");
        let admission = admission(&loader);

        let err = loader.load(&admission).await.unwrap_err();
        assert_eq!(err, QueryError::Unavailable("offline".to_string()));
        assert_eq!(loader.state(), ListState::Failed(err));

        store.heal_collection("complaints");
        assert_eq!(loader.load(&admission).await.unwrap().len(), 4);
        assert_eq!(store.query_calls(), 2);
    }

    #[tokio::test]
    async fn test_reset_discards_in_flight_result() {
        let store = seeded_store();
        let release = store.hold_queries();
        let loader = ComplaintLoader::new(store.clone(), "complaints");
        let admission = admission(&loader);

        let task = tokio::spawn({
            let loader = loader.clone();
            let admission = admission.clone();
            async move { loader.load(&admission).await }
        });
        while store.query_calls() == 0 {
            tokio::task::yield_now().await;
        }

        loader.reset();
        release.notify_one();

        assert_eq!(task.await.unwrap(), Err(QueryError::SessionEnded));
        assert_eq!(loader.state(), ListState::Idle);
    }

    #[tokio::test]
    async fn test_stale_admission_is_refused_without_fetch() {
        let store = seeded_store();
        let loader = ComplaintLoader::new(store.clone(), "complaints");
        let stale = admission(&loader);

        loader.reset();

        assert_eq!(loader.load(&stale).await, Err(QueryError::SessionEnded));
        assert_eq!(store.query_calls(), 0);
    }
}
