//! Access Guard: decides whether the signed-in identity may see complaints.
//!
//! The guard follows the session value in order. Every new identity, and
//! every fresh credential exchange, enters `CheckingRole`, which issues
//! exactly one profile read bounded by the
//! role-check timeout. The check re-validates the identity when it finishes
//! and its result is dropped if the session has moved on. An affirmative
//! decision starts the complaint load; any other outcome signs the identity
//! out and leaves an "Access denied" notice for the login page.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use fixit_core::{Email, Identity, Role, UserProfile};

use super::complaints::ComplaintLoader;
use super::error::{AuthError, ProfileLookupError};
use super::session::{SessionSubscription, SessionTracker};
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::ports::{Document, DocumentStore, IdentityProvider};

/// Shown on the login page after a forced sign-out.
pub const ACCESS_DENIED_NOTICE: &str =
    "Access denied. Only administrators can use the FixIt console.";

/// Extra time `sign_in` waits beyond the role-check timeout.
const DECISION_MARGIN: Duration = Duration::from_secs(2);

/// Guard tuning.
#[derive(Debug, Clone)]
pub struct GuardSettings {
    /// Collection holding one profile per identity id.
    pub profiles_collection: String,
    /// Upper bound on a single profile read.
    pub role_check_timeout: Duration,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            profiles_collection: "users".to_string(),
            role_check_timeout: Duration::from_secs(5),
        }
    }
}

/// Why an identity was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    /// The profile exists but does not carry the admin role.
    NotAdmin { role: Option<Role> },
    /// No profile document for this identity.
    MissingProfile,
    /// The profile could not be read.
    LookupFailed(ProfileLookupError),
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAdmin { role: Some(role) } => write!(f, "role \"{role}\" is not admin"),
            Self::NotAdmin { role: None } => f.write_str("profile has no role"),
            Self::MissingProfile => f.write_str("no profile document"),
            Self::LookupFailed(err) => write!(f, "{err}"),
        }
    }
}

/// Guard states.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AccessState {
    #[default]
    Unauthenticated,
    CheckingRole(Identity),
    AuthorizedAdmin(Identity),
    /// Refused; sign-out is under way.
    Denied {
        identity: Identity,
        reason: DenialReason,
    },
}

impl AccessState {
    /// The identity this state is about, if any.
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Unauthenticated => None,
            Self::CheckingRole(identity)
            | Self::AuthorizedAdmin(identity)
            | Self::Denied { identity, .. } => Some(identity),
        }
    }
}

/// Result of a role check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Admitted,
    Denied(DenialReason),
}

/// A role-check result that was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Increases by one with every applied decision.
    pub seq: u64,
    pub identity: Identity,
    pub verdict: Verdict,
}

/// Everything observers can see about the guard.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GuardSnapshot {
    pub state: AccessState,
    pub last_decision: Option<Decision>,
    /// Pending user-visible message, consumed by [`AccessGuard::take_notice`].
    pub notice: Option<String>,
    /// Number of role checks started so far.
    pub checks_started: u64,
}

impl GuardSnapshot {
    /// Sequence number of the last applied decision, 0 before any.
    #[must_use]
    pub fn last_seq(&self) -> u64 {
        self.last_decision.as_ref().map_or(0, |decision| decision.seq)
    }
}

/// Outcome of [`AccessGuard::sign_in`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessOutcome {
    Admitted(Identity),
    Denied(DenialReason),
    /// The session moved to another identity, or no decision arrived in time.
    Superseded,
}

/// Proof that the guard admitted an identity. Only the guard creates these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    identity: Identity,
    generation: u64,
}

impl Admission {
    pub(crate) const fn new(identity: Identity, generation: u64) -> Self {
        Self {
            identity,
            generation,
        }
    }

    /// The admitted identity.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    pub(crate) const fn generation(&self) -> u64 {
        self.generation
    }
}

struct GuardInner {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
    loader: ComplaintLoader,
    session: SessionTracker,
    settings: GuardSettings,
    snapshot: watch::Sender<GuardSnapshot>,
}

/// Role-gated access state machine.
#[derive(Clone)]
pub struct AccessGuard {
    inner: Arc<GuardInner>,
}

impl AccessGuard {
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        loader: ComplaintLoader,
        session: SessionTracker,
        settings: GuardSettings,
    ) -> Self {
        let (snapshot, _) = watch::channel(GuardSnapshot::default());
        Self {
            inner: Arc::new(GuardInner {
                identity,
                store,
                loader,
                session,
                settings,
                snapshot,
            }),
        }
    }

    /// Start following the session. The subscription is taken before this
    /// returns, so a rehydrated session is picked up by the first step.
    pub fn spawn(&self) -> JoinHandle<()> {
        let subscription = self.inner.session.subscribe();
        let guard = self.clone();
        tokio::spawn(async move { guard.drive(subscription).await })
    }

    async fn drive(self, mut subscription: SessionSubscription) {
        self.on_session(subscription.current());
        while let Some(identity) = subscription.next().await {
            self.on_session(identity);
        }
        debug!("access guard driver stopped");
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> GuardSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Watch snapshot changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<GuardSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// The loader this guard feeds.
    #[must_use]
    pub fn loader(&self) -> &ComplaintLoader {
        &self.inner.loader
    }

    /// The session tracker this guard follows.
    #[must_use]
    pub fn session(&self) -> &SessionTracker {
        &self.inner.session
    }

    /// Admission for the current identity, only while `AuthorizedAdmin`.
    #[must_use]
    pub fn admission(&self) -> Option<Admission> {
        match &self.inner.snapshot.borrow().state {
            AccessState::AuthorizedAdmin(identity) => Some(Admission::new(
                identity.clone(),
                self.inner.loader.generation(),
            )),
            _ => None,
        }
    }

    /// Take the pending notice, if any.
    pub fn take_notice(&self) -> Option<String> {
        let mut notice = None;
        self.inner.snapshot.send_if_modified(|snapshot| {
            notice = snapshot.notice.take();
            notice.is_some()
        });
        notice
    }

    /// Exchange credentials and wait for the role decision about the
    /// resulting identity.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] when the input is malformed or the identity
    /// provider refuses the credentials. Role refusals are not errors; they
    /// come back as [`AccessOutcome::Denied`].
    #[instrument(skip(self, password))]
    pub async fn sign_in(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AccessOutcome, AuthError> {
        let email = Email::parse(email)?;
        if password.expose_secret().is_empty() {
            return Err(AuthError::MissingPassword);
        }

        let mut rx = self.inner.snapshot.subscribe();
        let mut before = rx.borrow().last_seq();

        let identity = self
            .inner
            .identity
            .sign_in(&email, password)
            .await
            .inspect_err(|err| warn!(error = %err, "sign-in rejected"))?;
        info!(uid = %identity.id, "credentials accepted, awaiting role check");

        // Session notifications cannot tell a new sign-in from a token
        // refresh, so a repeat sign-in of the current identity starts its own
        // check here. Decisions applied before the restart are not about it.
        if let Some(seq) = self.begin_check(identity.clone(), true) {
            before = seq;
        }

        let wait = rx.wait_for(|snapshot| {
            snapshot.last_decision.as_ref().is_some_and(|decision| {
                decision.seq > before && decision.identity.same_principal(&identity)
            })
        });
        let decision = match tokio::time::timeout(self.decision_timeout(), wait).await {
            Ok(Ok(snapshot)) => snapshot.last_decision.clone(),
            Ok(Err(_)) | Err(_) => None,
        };

        Ok(match decision.map(|decision| decision.verdict) {
            Some(Verdict::Admitted) => AccessOutcome::Admitted(identity),
            Some(Verdict::Denied(reason)) => AccessOutcome::Denied(reason),
            None => {
                warn!(uid = %identity.id, "no role decision for this sign-in");
                AccessOutcome::Superseded
            }
        })
    }

    /// User-initiated sign-out.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Unavailable`] if the provider could not end the
    /// session. Local state is left untouched in that case.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.inner.identity.sign_out().await?;
        self.enter_unauthenticated();
        Ok(())
    }

    fn decision_timeout(&self) -> Duration {
        self.inner.settings.role_check_timeout + DECISION_MARGIN
    }

    fn on_session(&self, identity: Option<Identity>) {
        match identity {
            Some(identity) => {
                self.begin_check(identity, false);
            }
            None => self.enter_unauthenticated(),
        }
    }

    /// Enter `CheckingRole` for `identity` and spawn the check.
    ///
    /// Without `fresh`, an identity the guard already follows is left alone.
    /// With `fresh`, only a guard already checking or admitting that identity
    /// starts over, superseding any check still in flight; other identities
    /// are left for the session driver. Returns the last decision sequence
    /// number as of the start, or `None` if no check started.
    fn begin_check(&self, identity: Identity, fresh: bool) -> Option<u64> {
        let mut check = 0;
        let mut seq_at_start = 0;
        let started = self.inner.snapshot.send_if_modified(|snapshot| {
            let same = snapshot
                .state
                .identity()
                .is_some_and(|current| current.same_principal(&identity));
            let proceed = if fresh {
                same && matches!(
                    snapshot.state,
                    AccessState::CheckingRole(_) | AccessState::AuthorizedAdmin(_)
                )
            } else {
                !same
            };
            if !proceed {
                return false;
            }
            snapshot.state = AccessState::CheckingRole(identity.clone());
            snapshot.checks_started += 1;
            check = snapshot.checks_started;
            seq_at_start = snapshot.last_seq();
            true
        });
        if !started {
            if !fresh {
                debug!(uid = %identity.id, "session refresh for the identity already handled");
            }
            return None;
        }

        info!(uid = %identity.id, check, "checking role");
        self.inner.loader.reset();
        let guard = self.clone();
        tokio::spawn(async move {
            let verdict = guard.check_role(&identity).await;
            guard.complete_check(identity, check, verdict).await;
        });
        Some(seq_at_start)
    }

    fn enter_unauthenticated(&self) {
        let changed = self.inner.snapshot.send_if_modified(|snapshot| {
            if snapshot.state == AccessState::Unauthenticated {
                false
            } else {
                snapshot.state = AccessState::Unauthenticated;
                true
            }
        });
        self.inner.loader.reset();
        if changed {
            info!("signed out");
            clear_sentry_user();
        }
    }

    #[instrument(skip_all, fields(uid = %identity.id))]
    async fn check_role(&self, identity: &Identity) -> Verdict {
        let timeout = self.inner.settings.role_check_timeout;
        let read = self
            .inner
            .store
            .get_document(&self.inner.settings.profiles_collection, identity.id.as_str());

        match tokio::time::timeout(timeout, read).await {
            Err(_) => Verdict::Denied(DenialReason::LookupFailed(ProfileLookupError::TimedOut(
                timeout,
            ))),
            Ok(Err(err)) => {
                error!(error = %err, "profile lookup failed");
                Verdict::Denied(DenialReason::LookupFailed(err.into()))
            }
            Ok(Ok(None)) => Verdict::Denied(DenialReason::MissingProfile),
            Ok(Ok(Some(document))) => {
                let profile = profile_from_document(&document);
                if profile.is_admin() {
                    Verdict::Admitted
                } else {
                    Verdict::Denied(DenialReason::NotAdmin { role: profile.role })
                }
            }
        }
    }

    async fn complete_check(&self, identity: Identity, check: u64, verdict: Verdict) {
        let still_current = self
            .inner
            .session
            .current()
            .is_some_and(|current| current.same_principal(&identity));
        if !still_current {
            debug!(uid = %identity.id, "discarding role check for a previous session");
            return;
        }

        let applied = self.inner.snapshot.send_if_modified(|snapshot| {
            let checking = matches!(
                &snapshot.state,
                AccessState::CheckingRole(current) if current.same_principal(&identity)
            );
            if !checking || snapshot.checks_started != check {
                return false;
            }
            let seq = snapshot.last_seq() + 1;
            match &verdict {
                Verdict::Admitted => {
                    snapshot.state = AccessState::AuthorizedAdmin(identity.clone());
                    snapshot.notice = None;
                }
                Verdict::Denied(reason) => {
                    snapshot.state = AccessState::Denied {
                        identity: identity.clone(),
                        reason: reason.clone(),
                    };
                    snapshot.notice = Some(ACCESS_DENIED_NOTICE.to_owned());
                }
            }
            snapshot.last_decision = Some(Decision {
                seq,
                identity: identity.clone(),
                verdict: verdict.clone(),
            });
            true
        });
        if !applied {
            debug!(uid = %identity.id, "discarding role check, state moved on");
            return;
        }

        match verdict {
            Verdict::Admitted => {
                info!(uid = %identity.id, "admin access granted");
                set_sentry_user(&identity);
                let admission = Admission::new(identity, self.inner.loader.generation());
                let loader = self.inner.loader.clone();
                tokio::spawn(async move {
                    // Failures are published as list state.
                    let _ = loader.load(&admission).await;
                });
            }
            Verdict::Denied(reason) => {
                warn!(uid = %identity.id, %reason, "access denied, signing out");
                self.force_sign_out(&identity).await;
            }
        }
    }

    async fn force_sign_out(&self, identity: &Identity) {
        let still_signed_in = self
            .inner
            .identity
            .current_identity()
            .is_some_and(|current| current.same_principal(identity));

        let signed_out = if still_signed_in {
            let result = self.inner.identity.sign_out().await;
            self.inner.loader.reset();
            match result {
                Ok(()) => true,
                Err(err) => {
                    error!(error = %err, "forced sign-out failed");
                    false
                }
            }
        } else {
            debug!(uid = %identity.id, "provider session moved on, skipping forced sign-out");
            true
        };

        self.inner.snapshot.send_if_modified(|snapshot| match &snapshot.state {
            AccessState::Denied { identity: denied, .. } if denied.same_principal(identity) => {
                snapshot.state = AccessState::Unauthenticated;
                true
            }
            _ => false,
        });

        // A new sign-in may have landed while the sign-out was in flight and
        // been coalesced away by the session channel.
        if signed_out && let Some(current) = self.inner.identity.current_identity() {
            self.on_session(Some(current));
        }
    }
}

/// Map a raw profile document.
#[must_use]
pub fn profile_from_document(document: &Document) -> UserProfile {
    UserProfile {
        role: document.get_str("role").map(Role::from_stored),
    }
}
