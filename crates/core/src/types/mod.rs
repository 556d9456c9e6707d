//! Core types for FixIt.
//!
//! This module provides type-safe wrappers for the domain concepts the admin
//! console deals with.

pub mod complaint;
pub mod email;
pub mod id;
pub mod identity;

pub use complaint::{Complaint, ComplaintStatus, sort_newest_first};
pub use email::{Email, EmailError};
pub use id::*;
pub use identity::{ADMIN_ROLE, Identity, Role, UserProfile};
