//! NEFOL backend library.
//!
//! REST API behind the NEFOL storefront and admin panel: checkout and order
//! management, GST invoices, staff accounts with role based permissions,
//! admin alerts over email and WhatsApp, and Shiprocket fulfilment.
//!
//! The binary in `main.rs` wires configuration, logging and Sentry around
//! [`routes::app`]; everything else lives here so it can be tested.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod shiprocket;
pub mod state;
