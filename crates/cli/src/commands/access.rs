//! `check-access`: run the role check for an account.

use std::io::Write;

use fixit_admin::state::AppState;

use super::{CliError, Credentials, sign_in};

/// Sign in, print the decision and sign out again.
///
/// Returns whether the account was admitted. A denied account has already
/// been signed out by the guard.
///
/// # Errors
///
/// Returns `CliError` if sign-in fails before a decision is reached.
pub async fn check_access(
    state: &AppState,
    credentials: &Credentials,
    out: &mut impl Write,
) -> Result<bool, CliError> {
    match sign_in(state, credentials).await? {
        Ok(admission) => {
            let identity = admission.identity();
            writeln!(out, "admitted: {} ({})", identity.email, identity.id)?;
            state.guard().sign_out().await?;
            Ok(true)
        }
        Err(reason) => {
            writeln!(out, "denied: {} ({reason})", credentials.email)?;
            Ok(false)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::commands::tests::{credentials, fixture};
    use fixit_admin::services::AccessState;

    #[tokio::test]
    async fn test_admin_is_reported_and_signed_out() {
        let f = fixture();
        f.provider.add_account("warden@campus.edu", "pw", "uid-admin");
        f.store.put_profile("users", "uid-admin", "admin");

        let mut out = Vec::new();
        let admitted = check_access(&f.state, &credentials("warden@campus.edu", "pw"), &mut out)
            .await
            .unwrap();

        assert!(admitted);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "admitted: warden@campus.edu (uid-admin)\n"
        );
        assert_eq!(f.provider.sign_out_calls(), 1);
        assert_eq!(f.state.guard().snapshot().state, AccessState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_student_is_denied() {
        let f = fixture();
        f.provider.add_account("student@campus.edu", "pw", "uid-student");
        f.store.put_profile("users", "uid-student", "student");

        let mut out = Vec::new();
        let admitted = check_access(&f.state, &credentials("student@campus.edu", "pw"), &mut out)
            .await
            .unwrap();

        assert!(!admitted);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "denied: student@campus.edu (role \"student\" is not admin)\n"
        );
        assert_eq!(f.store.query_calls(), 0);
    }
}
