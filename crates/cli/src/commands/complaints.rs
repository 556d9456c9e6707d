//! `complaints`: print the complaint list, newest first.

use std::io::Write;

use fixit_core::Complaint;

use fixit_admin::state::AppState;

use super::{CliError, Credentials, sign_in};

/// Sign in, fetch the list, print it and sign out.
///
/// Returns `false` without printing a list if the account is not admitted.
///
/// # Errors
///
/// Returns `CliError` if sign-in or the fetch fails. The session is signed
/// out either way once admitted.
pub async fn list(
    state: &AppState,
    credentials: &Credentials,
    limit: Option<usize>,
    out: &mut impl Write,
) -> Result<bool, CliError> {
    let admission = match sign_in(state, credentials).await? {
        Ok(admission) => admission,
        Err(reason) => {
            writeln!(out, "denied: {} ({reason})", credentials.email)?;
            return Ok(false);
        }
    };

    let result = state.loader().load(&admission).await;
    state.guard().sign_out().await?;
    let complaints = result?;

    tracing::info!("Fetched {} complaints", complaints.len());
    let shown = limit.unwrap_or(complaints.len()).min(complaints.len());
    write_table(out, complaints.iter().take(shown))?;
    Ok(true)
}

/// One line per complaint: `created_at  status  title  address`.
///
/// # Errors
///
/// Returns any error from the writer.
pub fn write_table<'a>(
    out: &mut impl Write,
    complaints: impl IntoIterator<Item = &'a Complaint>,
) -> std::io::Result<()> {
    for complaint in complaints {
        let created_at = complaint.created_at.map_or_else(
            || "-".to_string(),
            |ts| ts.format("%Y-%m-%d %H:%M").to_string(),
        );
        writeln!(
            out,
            "{created_at:<16}  {:<11}  {}  {}",
            complaint.status.slug(),
            complaint.title,
            complaint.address
        )?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::commands::tests::{credentials, fixture};
    use chrono::{TimeZone, Utc};
    use fixit_admin::ports::{Document, FieldValue, StoreError};

    fn complaint(id: &str, title: &str, day: Option<u32>) -> Document {
        let doc = Document::new(id)
            .with_field("title", FieldValue::String(title.to_string()))
            .with_field("address", FieldValue::String("Hostel A".to_string()))
            .with_field("status", FieldValue::String("Pending".to_string()));
        match day {
            Some(day) => doc.with_field(
                "createdAt",
                FieldValue::Timestamp(Utc.with_ymd_and_hms(2025, 1, day, 9, 0, 0).unwrap()),
            ),
            None => doc,
        }
    }

    #[tokio::test]
    async fn test_lists_newest_first() {
        let f = fixture();
        f.provider.add_account("warden@campus.edu", "pw", "uid-admin");
        f.store.put_profile("users", "uid-admin", "admin");
        f.store.put("complaints", complaint("c1", "Old leak", Some(1)));
        f.store.put("complaints", complaint("c2", "Undated", None));
        f.store.put("complaints", complaint("c3", "New fuse", Some(3)));

        let mut out = Vec::new();
        let admitted = list(&f.state, &credentials("warden@campus.edu", "pw"), None, &mut out)
            .await
            .unwrap();
        assert!(admitted);

        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("2025-01-03 09:00"));
        assert!(lines[0].contains("New fuse"));
        assert!(lines[1].contains("Old leak"));
        assert!(lines[2].starts_with('-'));
        assert_eq!(f.provider.sign_out_calls(), 1);
    }

    #[tokio::test]
    async fn test_limit_and_failure() {
        let f = fixture();
        f.provider.add_account("warden@campus.edu", "pw", "uid-admin");
        f.store.put_profile("users", "uid-admin", "admin");
        f.store.put("complaints", complaint("c1", "One", Some(1)));
        f.store.put("complaints", complaint("c2", "Two", Some(2)));

        let mut out = Vec::new();
        list(&f.state, &credentials("warden@campus.edu", "pw"), Some(1), &mut out)
            .await
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);

        f.store.fail_collection(
            "complaints",
            StoreError::Unavailable("backend down".to_string()),
        );
        let err = list(&f.state, &credentials("warden@campus.edu", "pw"), None, &mut Vec::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CliError::Query(_)));
    }
}
