//! Core types for NEFOL.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod permission;
pub mod region;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{amount_in_words, format_inr};
pub use permission::{Permission, StandardRole, UnknownPermission};
pub use region::{district_code, state_code};
pub use status::*;
