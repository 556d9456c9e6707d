//! Complaint records and their lifecycle status.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::ComplaintId;

/// Lifecycle status of a complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ComplaintStatus {
    #[default]
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
}

impl ComplaintStatus {
    /// Parse a stored status value.
    ///
    /// Accepts the spellings the mobile app has written over time
    /// (`"In Progress"`, `"InProgress"`, `"in_progress"`), case-insensitively.
    /// Returns `None` for anything else.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "pending" => Some(Self::Pending),
            "inprogress" => Some(Self::InProgress),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Resolved => "Resolved",
        }
    }

    /// Stable slug, used for CSS classes and CLI output.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A maintenance-issue report, as fetched for one render cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complaint {
    pub id: ComplaintId,
    pub title: String,
    pub description: String,
    /// Reference to the uploaded photo, if any.
    pub image_url: Option<String>,
    pub address: String,
    pub status: ComplaintStatus,
    /// Missing on records written before the field existed.
    pub created_at: Option<DateTime<Utc>>,
}

impl Complaint {
    /// Ordering for "most recent first": descending `created_at`, with
    /// undated records after every dated one.
    #[must_use]
    pub fn newest_first(a: &Self, b: &Self) -> Ordering {
        match (a.created_at, b.created_at) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// Sort complaints most recent first. The sort is stable, so undated records
/// keep the order the store returned them in.
pub fn sort_newest_first(complaints: &mut [Complaint]) {
    complaints.sort_by(Complaint::newest_first);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn complaint(id: &str, created_at: Option<DateTime<Utc>>) -> Complaint {
        Complaint {
            id: ComplaintId::new(id),
            title: format!("Complaint {id}"),
            description: String::new(),
            image_url: None,
            address: "Library, 2nd floor".to_string(),
            status: ComplaintStatus::Pending,
            created_at,
        }
    }

    #[test]
    fn test_status_parse_accepts_known_spellings() {
        assert_eq!(ComplaintStatus::parse("Pending"), Some(ComplaintStatus::Pending));
        assert_eq!(
            ComplaintStatus::parse("In Progress"),
            Some(ComplaintStatus::InProgress)
        );
        assert_eq!(
            ComplaintStatus::parse("in_progress"),
            Some(ComplaintStatus::InProgress)
        );
        assert_eq!(
            ComplaintStatus::parse("InProgress"),
            Some(ComplaintStatus::InProgress)
        );
        assert_eq!(
            ComplaintStatus::parse(" RESOLVED "),
            Some(ComplaintStatus::Resolved)
        );
        assert_eq!(ComplaintStatus::parse("closed"), None);
    }

    #[test]
    fn test_status_serde_uses_display_spelling() {
        let json = serde_json::to_string(&ComplaintStatus::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");
    }

    #[test]
    fn test_sort_newest_first_puts_missing_last() {
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap();
        let t3 = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();

        let mut complaints = vec![
            complaint("missing", None),
            complaint("t3", Some(t3)),
            complaint("t1", Some(t1)),
            complaint("t2", Some(t2)),
        ];
        sort_newest_first(&mut complaints);

        let order: Vec<&str> = complaints.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(order, vec!["t3", "t2", "t1", "missing"]);
    }

    #[test]
    fn test_sort_is_stable_for_undated() {
        let mut complaints = vec![complaint("b", None), complaint("a", None)];
        sort_newest_first(&mut complaints);
        assert_eq!(complaints[0].id.as_str(), "b");
        assert_eq!(complaints[1].id.as_str(), "a");
    }
}
