//! Display model for complaint cards.

use fixit_core::{Complaint, ComplaintStatus};

/// Shown when a complaint has no timestamp.
pub const MISSING_DATE: &str = "N/A";

/// A complaint formatted for the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplaintView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub address: String,
    pub image_url: Option<String>,
    pub status_label: &'static str,
    pub status_class: &'static str,
    pub created_at: String,
}

impl From<&Complaint> for ComplaintView {
    fn from(complaint: &Complaint) -> Self {
        let title = if complaint.title.trim().is_empty() {
            "Untitled complaint".to_string()
        } else {
            complaint.title.clone()
        };

        Self {
            id: complaint.id.to_string(),
            title,
            description: complaint.description.clone(),
            address: complaint.address.clone(),
            image_url: complaint.image_url.clone(),
            status_label: complaint.status.label(),
            status_class: status_class(complaint.status),
            created_at: complaint.created_at.map_or_else(
                || MISSING_DATE.to_string(),
                |ts| ts.format("%b %-d, %Y %H:%M UTC").to_string(),
            ),
        }
    }
}

const fn status_class(status: ComplaintStatus) -> &'static str {
    match status {
        ComplaintStatus::Pending => "status-pending",
        ComplaintStatus::InProgress => "status-in-progress",
        ComplaintStatus::Resolved => "status-resolved",
    }
}
