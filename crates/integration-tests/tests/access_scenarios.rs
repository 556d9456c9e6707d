//! Access guard and complaint loader scenarios, end to end over the
//! in-memory collaborators.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use chrono::{TimeZone, Utc};
use secrecy::SecretString;

use fixit_admin::ports::StoreError;
use fixit_admin::ports::memory::{InMemoryDocumentStore, InMemoryIdentityProvider};
use fixit_admin::services::{
    ACCESS_DENIED_NOTICE, AccessOutcome, AccessState, DenialReason, ListState, QueryError,
};
use fixit_core::{Email, Identity, IdentityId};
use fixit_integration_tests::{COMPLAINTS, PROFILES, TestContext, complaint};

fn password(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

#[tokio::test]
async fn admin_is_admitted_and_sees_sorted_list() {
    let ctx = TestContext::new();
    let admin = ctx.account("warden@campus.edu", "pw", "uid-admin", "admin");
    let t = |day| Some(Utc.with_ymd_and_hms(2025, 2, day, 8, 0, 0).unwrap());
    ctx.store.put(COMPLAINTS, complaint("c3", "T3", "Pending", t(3)));
    ctx.store.put(COMPLAINTS, complaint("c1", "T1", "Resolved", t(1)));
    ctx.store.put(COMPLAINTS, complaint("c2", "T2", "In Progress", t(2)));
    ctx.store.put(COMPLAINTS, complaint("cx", "Missing", "Pending", None));

    let outcome = ctx
        .guard()
        .sign_in("warden@campus.edu", &password("pw"))
        .await
        .unwrap();
    assert_eq!(outcome, AccessOutcome::Admitted(admin.clone()));
    assert_eq!(ctx.guard().snapshot().state, AccessState::AuthorizedAdmin(admin));

    let ListState::Loaded(list) = ctx
        .wait_for_list(|s| matches!(s, ListState::Loaded(_)))
        .await
    else {
        unreachable!()
    };
    let titles: Vec<&str> = list.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, ["T3", "T2", "T1", "Missing"]);
    assert_eq!(ctx.store.get_calls(), 1);
    assert_eq!(ctx.store.query_calls(), 1);
}

#[tokio::test]
async fn revoked_admin_is_denied_on_next_sign_in() {
    let ctx = TestContext::new();
    let admin = ctx.account("warden@campus.edu", "pw", "uid-admin", "admin");

    let first = ctx
        .guard()
        .sign_in("warden@campus.edu", &password("pw"))
        .await
        .unwrap();
    assert_eq!(first, AccessOutcome::Admitted(admin));

    ctx.store.put_profile(PROFILES, "uid-admin", "student");
    let second = ctx
        .guard()
        .sign_in("warden@campus.edu", &password("pw"))
        .await
        .unwrap();
    assert!(matches!(
        second,
        AccessOutcome::Denied(DenialReason::NotAdmin { .. })
    ));

    ctx.wait_for_guard(|s| s.state == AccessState::Unauthenticated)
        .await;
    assert_eq!(ctx.store.get_calls(), 2);
    assert_eq!(ctx.provider.sign_out_calls(), 1);
    assert!(ctx.guard().admission().is_none());
}

#[tokio::test]
async fn student_is_denied_and_signed_out() {
    let ctx = TestContext::new();
    ctx.account("student@campus.edu", "pw", "uid-student", "student");

    let outcome = ctx
        .guard()
        .sign_in("student@campus.edu", &password("pw"))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        AccessOutcome::Denied(DenialReason::NotAdmin { .. })
    ));

    ctx.wait_for_guard(|s| s.state == AccessState::Unauthenticated)
        .await;
    assert_eq!(ctx.provider.sign_out_calls(), 1);
    assert_eq!(ctx.guard().take_notice().as_deref(), Some(ACCESS_DENIED_NOTICE));
    assert_eq!(ctx.store.query_calls(), 0);
    assert_eq!(ctx.state.loader().state(), ListState::Idle);
}

#[tokio::test]
async fn missing_profile_is_denied() {
    let ctx = TestContext::new();
    ctx.provider.add_account("ghost@campus.edu", "pw", "uid-ghost");

    let outcome = ctx
        .guard()
        .sign_in("ghost@campus.edu", &password("pw"))
        .await
        .unwrap();
    assert_eq!(outcome, AccessOutcome::Denied(DenialReason::MissingProfile));
    ctx.wait_for_guard(|s| s.state == AccessState::Unauthenticated)
        .await;
    assert_eq!(ctx.store.query_calls(), 0);
}

#[tokio::test]
async fn unreachable_profile_store_is_denied() {
    let ctx = TestContext::new();
    ctx.account("warden@campus.edu", "pw", "uid-admin", "admin");
    ctx.store.fail_collection(
        PROFILES,
        StoreError::PermissionDenied("rules".to_string()),
    );

    let outcome = ctx
        .guard()
        .sign_in("warden@campus.edu", &password("pw"))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        AccessOutcome::Denied(DenialReason::LookupFailed(_))
    ));
    assert_eq!(ctx.provider.sign_out_calls(), 1);
}

#[tokio::test]
async fn slow_profile_read_times_out_as_denial() {
    let ctx = TestContext::with_provider(InMemoryIdentityProvider::new(), Duration::from_millis(50));
    ctx.account("warden@campus.edu", "pw", "uid-admin", "admin");
    let _release = ctx.store.hold_document(PROFILES, "uid-admin");

    let outcome = ctx
        .guard()
        .sign_in("warden@campus.edu", &password("pw"))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        AccessOutcome::Denied(DenialReason::LookupFailed(_))
    ));
}

#[tokio::test]
async fn failed_fetch_leaves_session_intact_and_retry_recovers() {
    let ctx = TestContext::new();
    let admin = ctx.account("warden@campus.edu", "pw", "uid-admin", "admin");
    ctx.store.put(COMPLAINTS, complaint("c1", "Leak", "Pending", None));
    ctx.store.fail_collection(
        COMPLAINTS,
        StoreError::Unavailable("backend down".to_string()),
    );

    ctx.guard()
        .sign_in("warden@campus.edu", &password("pw"))
        .await
        .unwrap();
    let state = ctx
        .wait_for_list(|s| matches!(s, ListState::Failed(_)))
        .await;
    assert!(matches!(state, ListState::Failed(QueryError::Unavailable(_))));
    assert_eq!(ctx.guard().snapshot().state, AccessState::AuthorizedAdmin(admin));

    ctx.store.heal_collection(COMPLAINTS);
    let admission = ctx.guard().admission().unwrap();
    let list = ctx.state.loader().load(&admission).await.unwrap();
    assert_eq!(list.len(), 1);
}

#[tokio::test]
async fn rapid_switches_settle_on_last_identity() {
    let ctx = TestContext::new();
    let admin = ctx.account("warden@campus.edu", "pw", "uid-admin", "admin");
    ctx.account("student@campus.edu", "pw", "uid-student", "student");
    let release = ctx.store.hold_document(PROFILES, "uid-admin");

    // Admin's check is held while the student signs in over the top
    ctx.provider.emit(Some(admin.clone()));
    ctx.wait_for_guard(|s| s.state == AccessState::CheckingRole(admin.clone()))
        .await;
    let outcome = ctx
        .guard()
        .sign_in("student@campus.edu", &password("pw"))
        .await
        .unwrap();
    assert!(matches!(outcome, AccessOutcome::Denied(_)));

    release.notify_one();
    let snapshot = ctx
        .wait_for_guard(|s| s.state == AccessState::Unauthenticated)
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The stale admin result never lands
    assert_eq!(ctx.guard().snapshot().state, AccessState::Unauthenticated);
    assert_eq!(snapshot.last_seq(), ctx.guard().snapshot().last_seq());
    assert!(ctx.guard().admission().is_none());
    assert_eq!(ctx.store.query_calls(), 0);
}

#[tokio::test]
async fn persisted_session_is_rechecked_at_startup() {
    let identity = Identity::new(
        IdentityId::new("uid-admin"),
        Email::parse("warden@campus.edu").unwrap(),
    );
    let provider = InMemoryIdentityProvider::new().with_session(identity.clone());
    let store = InMemoryDocumentStore::new();
    store.put_profile(PROFILES, "uid-admin", "admin");
    let ctx = TestContext::with_parts(provider, store, Duration::from_secs(5));

    let snapshot = ctx
        .wait_for_guard(|s| matches!(s.state, AccessState::AuthorizedAdmin(_)))
        .await;
    assert_eq!(snapshot.state, AccessState::AuthorizedAdmin(identity));
    assert_eq!(snapshot.checks_started, 1);
    assert_eq!(ctx.store.get_calls(), 1);
}

#[tokio::test]
async fn sign_out_clears_everything() {
    let ctx = TestContext::new();
    ctx.account("warden@campus.edu", "pw", "uid-admin", "admin");
    ctx.guard()
        .sign_in("warden@campus.edu", &password("pw"))
        .await
        .unwrap();
    ctx.wait_for_list(|s| matches!(s, ListState::Loaded(_)))
        .await;

    ctx.guard().sign_out().await.unwrap();
    assert_eq!(ctx.guard().snapshot().state, AccessState::Unauthenticated);
    assert_eq!(ctx.state.loader().state(), ListState::Idle);
    assert!(ctx.guard().admission().is_none());
}
