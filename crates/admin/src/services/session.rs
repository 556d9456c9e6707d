//! Session Tracker: the process-wide "who is signed in" value.
//!
//! The tracker is the only writer of the current session. It holds at most
//! one subscription to the identity provider, opened when the first consumer
//! subscribes and dropped when the last consumer goes away.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use fixit_core::Identity;

use crate::ports::IdentityProvider;

/// Process-wide session value fed by the identity provider.
#[derive(Clone)]
pub struct SessionTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    provider: Arc<dyn IdentityProvider>,
    current: watch::Sender<Option<Identity>>,
    lifecycle: Mutex<Lifecycle>,
}

#[derive(Default)]
struct Lifecycle {
    consumers: usize,
    pump: Option<JoinHandle<()>>,
}

impl SessionTracker {
    /// Create a tracker. Nothing is subscribed until the first consumer
    /// calls [`SessionTracker::subscribe`].
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            inner: Arc::new(TrackerInner {
                provider,
                current,
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        }
    }

    /// The current session, `None` when signed out.
    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.inner.current.borrow().clone()
    }

    /// Whether the provider subscription is open and being pumped.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.inner
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pump
            .as_ref()
            .is_some_and(|pump| !pump.is_finished())
    }

    /// Number of live [`SessionSubscription`]s.
    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.inner
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .consumers
    }

    /// Register a consumer.
    ///
    /// The first registration subscribes to the provider and seeds the
    /// session from the provider's current identity, so a session the
    /// provider rehydrated on startup is visible immediately.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn subscribe(&self) -> SessionSubscription {
        let mut lifecycle = self
            .inner
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if !lifecycle.pump.as_ref().is_some_and(|pump| !pump.is_finished()) {
            // Subscribe before reading the current identity so no change
            // can fall between the two.
            let events = self.inner.provider.subscribe();
            let initial = self.inner.provider.current_identity();
            debug!(signed_in = initial.is_some(), "opening identity provider subscription");
            self.inner.current.send_replace(initial);
            lifecycle.pump = Some(tokio::spawn(pump(Arc::clone(&self.inner), events)));
        }
        lifecycle.consumers += 1;

        SessionSubscription {
            rx: self.inner.current.subscribe(),
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Forward provider notifications into the session value, in order.
async fn pump(inner: Arc<TrackerInner>, mut events: broadcast::Receiver<Option<Identity>>) {
    loop {
        match events.recv().await {
            Ok(identity) => {
                match &identity {
                    Some(identity) => info!(uid = %identity.id, "session changed: signed in"),
                    None => info!("session changed: signed out"),
                }
                inner.current.send_replace(identity);
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "session tracker lagged; re-reading provider state");
                inner.current.send_replace(inner.provider.current_identity());
            }
            Err(RecvError::Closed) => {
                info!("identity provider closed its change stream");
                break;
            }
        }
    }
}

/// A registered consumer of the session value.
///
/// Dropping the last subscription closes the provider subscription.
pub struct SessionSubscription {
    rx: watch::Receiver<Option<Identity>>,
    inner: Arc<TrackerInner>,
}

impl SessionSubscription {
    /// The session value as of now.
    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.rx.borrow().clone()
    }

    /// Wait for the next session value.
    ///
    /// Values arrive in the order the tracker wrote them; if several writes
    /// happen before the consumer looks, only the newest is seen.
    pub async fn next(&mut self) -> Option<Option<Identity>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        let mut lifecycle = self
            .inner
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        lifecycle.consumers = lifecycle.consumers.saturating_sub(1);
        if lifecycle.consumers == 0
            && let Some(pump) = lifecycle.pump.take()
        {
            pump.abort();
            debug!("last session consumer dropped; identity provider unsubscribed");
        }
    }
}
