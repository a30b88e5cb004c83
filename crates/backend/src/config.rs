//! Backend configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is read first when present.
//!
//! | Variable | Default |
//! |---|---|
//! | `DATABASE_URL` | required |
//! | `HOST` / `PORT` | `0.0.0.0` / `2000` |
//! | `PUBLIC_BASE_URL` | <https://thenefol.com> |
//! | `STAFF_SESSION_TTL_HOURS` | `12` |
//! | `CORS_ALLOWED_ORIGINS` | any origin |
//! | `SHIPROCKET_BASE_URL` | <https://apiv2.shiprocket.in/v1/external> |
//! | `CHROME_BIN` | `chromium` |
//! | `SENTRY_DSN`, `SENTRY_ENVIRONMENT` | unset |
//! | `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` | `1.0` / `0.1` |
//!
//! Groups that are enabled only when their pair of variables is set (setting
//! one without the other is an error):
//!
//! - Email: `EMAIL_USER` + `EMAIL_PASS`, with `SMTP_HOST` (smtp.hostinger.com),
//!   `SMTP_PORT` (465 implicit TLS, anything else STARTTLS), `EMAIL_FROM`
//!   and `ADMIN_EMAIL` (support@thenefol.com).
//! - WhatsApp: `WHATSAPP_ACCESS_TOKEN` + `WHATSAPP_PHONE_NUMBER_ID`, with
//!   `WHATSAPP_API_VERSION` (v19.0).
//! - TLS: `TLS_CERT` + `TLS_KEY`, both PEM.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_PUBLIC_BASE_URL: &str = "https://thenefol.com";
const DEFAULT_SHIPROCKET_BASE_URL: &str = "https://apiv2.shiprocket.in/v1/external";
const DEFAULT_SMTP_HOST: &str = "smtp.hostinger.com";
const DEFAULT_ADMIN_EMAIL: &str = "support@thenefol.com";
const DEFAULT_WHATSAPP_API_VERSION: &str = "v19.0";
const DEFAULT_SESSION_TTL_HOURS: i64 = 12;

/// Tokens shorter than this, or made of fewer distinct characters, are
/// rejected as copy-paste mistakes.
const MIN_SECRET_LEN: usize = 20;
const MIN_DISTINCT_CHARS: usize = 10;

/// Fragments that only show up in sample `.env` files.
const PLACEHOLDER_FRAGMENTS: &[&str] = &[
    "your-", "your_", "changeme", "replace", "placeholder", "example", "xxx", "todo", "insert",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(&'static str, String),

    #[error("{0} and {1} must be set together")]
    Unpaired(&'static str, &'static str),

    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(&'static str, String),
}

/// Backend application configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    /// Storefront origin, without a trailing slash. Used for absolute links
    /// in emails and invoice asset URLs.
    pub public_base_url: String,
    /// Staff bearer token lifetime.
    pub staff_session_ttl_hours: i64,
    /// Browser origins allowed by CORS. Empty allows any origin.
    pub cors_allowed_origins: Vec<String>,
    pub shiprocket_base_url: String,
    /// Headless Chrome/Chromium used to print invoice PDFs.
    pub chrome_bin: String,
    pub email: Option<EmailConfig>,
    pub whatsapp: Option<WhatsAppConfig>,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
    pub tls: Option<TlsConfig>,
}

/// SMTP settings. `SecretString` keeps the password out of `Debug` output.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    /// `From` header; defaults to the SMTP username.
    pub from_address: String,
    /// Where admin copies of order emails go.
    pub admin_address: String,
}

/// WhatsApp Cloud API settings.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub access_token: SecretString,
    pub phone_number_id: String,
    pub api_version: String,
}

/// PEM certificate chain and key for serving HTTPS directly.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert_pem: String,
    pub key_pem: SecretString,
}

impl BackendConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `DATABASE_URL` is missing, a value does not
    /// parse, only half of a paired group is set, or the WhatsApp token looks
    /// like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = SecretString::from(
            optional("DATABASE_URL").ok_or(ConfigError::MissingEnvVar("DATABASE_URL"))?,
        );

        let public_base_url = trim_slash(or_default("PUBLIC_BASE_URL", DEFAULT_PUBLIC_BASE_URL));
        url::Url::parse(&public_base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("PUBLIC_BASE_URL", e.to_string()))?;

        let staff_session_ttl_hours = parsed("STAFF_SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)?;
        if staff_session_ttl_hours <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "STAFF_SESSION_TTL_HOURS",
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            host: parsed("HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: parsed("PORT", 2000)?,
            public_base_url,
            staff_session_ttl_hours,
            cors_allowed_origins: parse_origins(optional("CORS_ALLOWED_ORIGINS").as_deref()),
            shiprocket_base_url: trim_slash(or_default("SHIPROCKET_BASE_URL", DEFAULT_SHIPROCKET_BASE_URL)),
            chrome_bin: or_default("CHROME_BIN", "chromium"),
            email: EmailConfig::from_env()?,
            whatsapp: WhatsAppConfig::from_env()?,
            sentry_dsn: optional("SENTRY_DSN"),
            sentry_environment: optional("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parsed("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: parsed("SENTRY_TRACES_SAMPLE_RATE", 0.1)?,
            tls: paired("TLS_CERT", "TLS_KEY")?.map(|(cert_pem, key)| TlsConfig {
                cert_pem,
                key_pem: SecretString::from(key),
            }),
        })
    }

    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    #[must_use]
    pub fn staff_session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.staff_session_ttl_hours)
    }

    /// Turn a possibly relative asset URL into an absolute one.
    ///
    /// `/uploads/logo.png` becomes `https://thenefol.com/uploads/logo.png`;
    /// absolute and `data:` URLs are returned untouched.
    #[must_use]
    pub fn absolute_url(&self, raw: &str) -> String {
        let raw = raw.trim();
        let already_absolute = ["http://", "https://", "data:"]
            .iter()
            .any(|scheme| raw.starts_with(scheme));
        if raw.is_empty() || already_absolute {
            return raw.to_string();
        }
        format!("{}/{}", self.public_base_url, raw.trim_start_matches('/'))
    }
}

impl EmailConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some((smtp_username, password)) = paired("EMAIL_USER", "EMAIL_PASS")? else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host: or_default("SMTP_HOST", DEFAULT_SMTP_HOST),
            smtp_port: parsed("SMTP_PORT", 465)?,
            from_address: optional("EMAIL_FROM").unwrap_or_else(|| smtp_username.clone()),
            smtp_username,
            smtp_password: SecretString::from(password),
            admin_address: or_default("ADMIN_EMAIL", DEFAULT_ADMIN_EMAIL),
        }))
    }
}

impl WhatsAppConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some((token, phone_number_id)) = paired("WHATSAPP_ACCESS_TOKEN", "WHATSAPP_PHONE_NUMBER_ID")? else {
            return Ok(None);
        };
        check_secret("WHATSAPP_ACCESS_TOKEN", &token)?;

        Ok(Some(Self {
            access_token: SecretString::from(token),
            phone_number_id,
            api_version: or_default("WHATSAPP_API_VERSION", DEFAULT_WHATSAPP_API_VERSION),
        }))
    }
}

// =============================================================================
// Environment helpers
// =============================================================================

/// A set, non-blank variable.
fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn or_default(key: &str, default: &str) -> String {
    optional(key).unwrap_or_else(|| default.to_string())
}

fn parsed<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key, e.to_string()))
    })
}

/// Both variables or neither.
fn paired(first: &'static str, second: &'static str) -> Result<Option<(String, String)>, ConfigError> {
    match (optional(first), optional(second)) {
        (Some(a), Some(b)) => Ok(Some((a, b))),
        (None, None) => Ok(None),
        _ => Err(ConfigError::Unpaired(first, second)),
    }
}

fn trim_slash(value: String) -> String {
    value.trim_end_matches('/').to_string()
}

/// Split a comma separated origin list, dropping blanks and trailing slashes.
fn parse_origins(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(|o| o.trim().trim_end_matches('/'))
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect()
}

/// Reject sample-file placeholders and obviously truncated tokens.
fn check_secret(key: &'static str, secret: &str) -> Result<(), ConfigError> {
    let lower = secret.to_ascii_lowercase();
    if let Some(fragment) = PLACEHOLDER_FRAGMENTS.iter().find(|f| lower.contains(*f)) {
        return Err(ConfigError::InsecureSecret(
            key,
            format!("looks like a placeholder (contains '{fragment}')"),
        ));
    }

    let distinct = secret.chars().collect::<HashSet<_>>().len();
    if secret.len() < MIN_SECRET_LEN || distinct < MIN_DISTINCT_CHARS {
        return Err(ConfigError::InsecureSecret(
            key,
            format!("too short or repetitive ({} chars, {distinct} distinct)", secret.len()),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> BackendConfig {
        BackendConfig {
            database_url: SecretString::from("postgres://localhost/nefol_test"),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 2000,
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            staff_session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            cors_allowed_origins: vec![],
            shiprocket_base_url: DEFAULT_SHIPROCKET_BASE_URL.to_string(),
            chrome_bin: "chromium".to_string(),
            email: None,
            whatsapp: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
            tls: None,
        }
    }

    #[test]
    fn test_socket_addr_and_ttl() {
        let config = config();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:2000");
        assert_eq!(config.staff_session_ttl(), chrono::Duration::hours(12));
    }

    #[test]
    fn test_absolute_url() {
        let config = config();
        assert_eq!(
            config.absolute_url("/uploads/logo.png"),
            "https://thenefol.com/uploads/logo.png"
        );
        assert_eq!(
            config.absolute_url("uploads/sign.png"),
            "https://thenefol.com/uploads/sign.png"
        );
        assert_eq!(
            config.absolute_url("https://cdn.thenefol.com/logo.png"),
            "https://cdn.thenefol.com/logo.png"
        );
        assert_eq!(config.absolute_url("data:image/png;base64,AAAA"), "data:image/png;base64,AAAA");
        assert_eq!(config.absolute_url(""), "");
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins(Some(" https://admin.thenefol.com/, https://thenefol.com ,")),
            vec!["https://admin.thenefol.com", "https://thenefol.com"]
        );
        assert!(parse_origins(None).is_empty());
    }

    #[test]
    fn test_check_secret() {
        assert!(matches!(
            check_secret("T", "your-whatsapp-token-goes-here"),
            Err(ConfigError::InsecureSecret(_, _))
        ));
        assert!(check_secret("T", "aaaaaaaaaaaaaaaaaaaaaaaa").is_err());
        assert!(check_secret("T", "EAAG12").is_err());
        assert!(check_secret("T", "EAAGm0PX4ZCpsBAKf9qZC7ZBvN2xY").is_ok());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let email = EmailConfig {
            smtp_host: DEFAULT_SMTP_HOST.to_string(),
            smtp_port: 465,
            smtp_username: "orders@thenefol.com".to_string(),
            smtp_password: SecretString::from("super_secret_smtp_password"),
            from_address: "orders@thenefol.com".to_string(),
            admin_address: DEFAULT_ADMIN_EMAIL.to_string(),
        };
        let output = format!("{email:?}");
        assert!(output.contains("smtp.hostinger.com"));
        assert!(!output.contains("super_secret_smtp_password"));

        let whatsapp = WhatsAppConfig {
            access_token: SecretString::from("EAAG-very-secret"),
            phone_number_id: "1234567890".to_string(),
            api_version: DEFAULT_WHATSAPP_API_VERSION.to_string(),
        };
        let output = format!("{whatsapp:?}");
        assert!(output.contains("1234567890"));
        assert!(!output.contains("EAAG-very-secret"));
    }
}
