//! FixIt Admin library.
//!
//! The complaint-tracking admin console as a library, so the binary, the CLI
//! and the integration tests drive the same components.
//!
//! # Components
//!
//! - [`services::SessionTracker`] - single observable copy of the provider's
//!   current identity
//! - [`services::AccessGuard`] - role-gated state machine deciding whether
//!   that identity may see complaints
//! - [`services::ComplaintLoader`] - fetches, sorts and publishes the list
//! - [`routes`] - server-rendered views over the above
//!
//! # Security
//!
//! Only identities whose profile document carries the `admin` role are
//! admitted. Everyone else is signed out again immediately.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod filters;
pub mod firebase;
pub mod middleware;
pub mod models;
pub mod ports;
pub mod routes;
pub mod services;
pub mod state;
