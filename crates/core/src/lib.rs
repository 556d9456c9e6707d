//! FixIt Core - Shared domain types.
//!
//! This crate provides the types shared by every FixIt component:
//! - `admin` - Complaint-tracking admin console
//! - `cli` - Headless operator tool
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no runtime.
//! Collaborator ports and adapters live in the admin crate.
//!
//! # Modules
//!
//! - [`types`] - Identities, roles, emails and complaint records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
