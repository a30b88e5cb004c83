//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use tracing::warn;

use crate::config::BackendConfig;
use crate::services::email::EmailService;
use crate::services::invoice::PdfRenderer;
use crate::services::whatsapp::WhatsAppClient;
use crate::shiprocket::ShiprocketClient;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: BackendConfig,
    pool: PgPool,
    shiprocket: ShiprocketClient,
    email: Option<EmailService>,
    whatsapp: Option<WhatsAppClient>,
    pdf: PdfRenderer,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Email and WhatsApp are optional: when their settings are absent or
    /// unusable the corresponding notifications are skipped.
    #[must_use]
    pub fn new(config: BackendConfig, pool: PgPool) -> Self {
        let shiprocket = ShiprocketClient::new(&config.shiprocket_base_url, pool.clone());

        let email = config.email.as_ref().and_then(|email_config| {
            EmailService::new(email_config)
                .inspect_err(|e| warn!(error = %e, "Email disabled: invalid SMTP settings"))
                .ok()
        });

        let whatsapp = config.whatsapp.as_ref().and_then(|wa_config| {
            WhatsAppClient::new(wa_config)
                .inspect_err(|e| warn!(error = %e, "WhatsApp disabled: client setup failed"))
                .ok()
        });

        let pdf = PdfRenderer::new(config.chrome_bin.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                shiprocket,
                email,
                whatsapp,
                pdf,
            }),
        }
    }

    /// Get a reference to the backend configuration.
    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the Shiprocket client.
    #[must_use]
    pub fn shiprocket(&self) -> &ShiprocketClient {
        &self.inner.shiprocket
    }

    /// Customer email service, when SMTP is configured.
    #[must_use]
    pub fn email(&self) -> Option<&EmailService> {
        self.inner.email.as_ref()
    }

    /// Customer WhatsApp client, when the Cloud API is configured.
    #[must_use]
    pub fn whatsapp(&self) -> Option<&WhatsAppClient> {
        self.inner.whatsapp.as_ref()
    }

    #[must_use]
    pub fn pdf(&self) -> &PdfRenderer {
        &self.inner.pdf
    }
}
