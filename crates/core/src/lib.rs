//! NEFOL Core - Shared domain types.
//!
//! This crate provides the types used across the NEFOL backend components:
//! - `backend` - REST API for orders, invoices, staff and shipping
//! - `cli` - Command-line tools for migrations and staff management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Database encoding is available behind the
//! `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, statuses, permissions, GST regions and money helpers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
