//! Access-flow services.
//!
//! # Services
//!
//! - `session` - Session Tracker, the single writer of the current identity
//! - `access` - Access Guard, the role-gated state machine
//! - `complaints` - Complaint List Loader
//! - `error` - error kinds surfaced by the services

pub mod access;
pub mod complaints;
pub mod error;
pub mod session;

pub use access::{
    ACCESS_DENIED_NOTICE, AccessGuard, AccessOutcome, AccessState, Admission, Decision,
    DenialReason, GuardSettings, GuardSnapshot, Verdict,
};
pub use complaints::{ComplaintLoader, ListState};
pub use error::{AuthError, ProfileLookupError, QueryError};
pub use session::{SessionSubscription, SessionTracker};
