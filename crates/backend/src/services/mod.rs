//! Business logic services for the backend.
//!
//! # Services
//!
//! - `alerts` - Admin alert settings, new-order alerts and the notification feed
//! - `auth` - Staff password login, bearer tokens and account management
//! - `email` - Transactional email via SMTP
//! - `invoice` - Invoice settings, GST lines, HTML and PDF rendering
//! - `orders` - Checkout, admin updates, splits and CSV export
//! - `sequences` - Order and invoice numbering
//! - `whatsapp` - Meta WhatsApp Cloud API client

pub mod alerts;
pub mod auth;
pub mod email;
pub mod invoice;
pub mod orders;
pub mod sequences;
pub mod whatsapp;

pub use alerts::{AlertConfig, AlertError};
pub use auth::{StaffAuthError, StaffAuthService};
pub use email::{EmailError, EmailService};
pub use invoice::{InvoiceError, PdfRenderer};
pub use orders::OrderError;
pub use whatsapp::{WhatsAppClient, WhatsAppError};
