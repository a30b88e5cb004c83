//! Shiprocket authentication.
//!
//! Shiprocket issues bearer tokens valid for ten days in exchange for the
//! API user's email and password.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::ShiprocketError;

/// How long a token is reused before logging in again.
pub const TOKEN_CACHE_DAYS: i64 = 9;

/// Bearer token obtained from Shiprocket.
#[derive(Debug, Clone)]
pub struct ShiprocketToken {
    pub token: SecretString,
    /// Unix timestamp after which the token is no longer reused.
    pub expires_at: i64,
}

impl ShiprocketToken {
    /// Wrap a freshly issued token.
    #[must_use]
    pub fn issued_now(token: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            token: SecretString::from(token),
            expires_at: now + chrono::Duration::days(TOKEN_CACHE_DAYS).num_seconds(),
        }
    }

    /// Check if the token is past its reuse window.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp() >= self.expires_at
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Deserialize)]
struct LoginErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

/// Log in to Shiprocket with an API user's email and password.
///
/// # Errors
///
/// Returns `ShiprocketError::AuthenticationFailed` if the credentials are
/// rejected or no token comes back.
#[instrument(skip(client, password), fields(email = %email))]
pub async fn login(
    client: &reqwest::Client,
    base_url: &str,
    email: &str,
    password: &SecretString,
) -> Result<ShiprocketToken, ShiprocketError> {
    let response = client
        .post(format!("{base_url}/auth/login"))
        .json(&LoginRequest {
            email,
            password: password.expose_secret(),
        })
        .send()
        .await?;

    let status = response.status();

    if status.is_success() {
        let body: LoginResponse = response.json().await?;
        body.token
            .filter(|t| !t.is_empty())
            .map(ShiprocketToken::issued_now)
            .ok_or_else(|| ShiprocketError::AuthenticationFailed("No token in response".to_string()))
    } else {
        let message = response
            .json::<LoginErrorResponse>()
            .await
            .ok()
            .and_then(|e| e.message)
            .unwrap_or_else(|| format!("HTTP {status}"));

        Err(ShiprocketError::AuthenticationFailed(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_token_is_valid_for_nine_days() {
        let token = ShiprocketToken::issued_now("abc".to_string());
        assert!(!token.is_expired());

        let remaining = token.expires_at - chrono::Utc::now().timestamp();
        assert!(remaining > 8 * 86_400);
        assert!(remaining <= 9 * 86_400);
    }

    #[test]
    fn test_token_is_expired() {
        let token = ShiprocketToken {
            token: SecretString::from("abc"),
            expires_at: chrono::Utc::now().timestamp() - 1,
        };
        assert!(token.is_expired());
    }
}
