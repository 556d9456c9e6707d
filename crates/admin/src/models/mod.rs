//! View and session models for admin.

pub mod complaint;
pub mod session;

pub use complaint::ComplaintView;
pub use session::{CurrentAdmin, keys as session_keys};
