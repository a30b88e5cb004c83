//! Shiprocket REST API client.
//!
//! Holds the cached bearer token and pickup location. Credentials are read
//! from the database on demand so a config change takes effect on the next
//! call once the cache is cleared.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::{instrument, warn};

use super::ShiprocketError;
use super::auth::{ShiprocketToken, login};
use super::payload::{DEFAULT_PICKUP_LOCATION, choose_pickup_location, error_message};
use crate::db::ShipmentRepository;

/// How long the chosen pickup location is reused.
const PICKUP_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Cache key for the pickup location.
const PICKUP_KEY: &str = "pickup_location";

/// Shiprocket REST API client.
///
/// Cheap to clone; clones share the token and pickup caches.
#[derive(Clone)]
pub struct ShiprocketClient {
    inner: Arc<ShiprocketClientInner>,
}

struct ShiprocketClientInner {
    client: reqwest::Client,
    base_url: String,
    pool: PgPool,
    /// In-memory token cache
    token: RwLock<Option<ShiprocketToken>>,
    pickup: Cache<&'static str, String>,
}

impl std::fmt::Debug for ShiprocketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShiprocketClient")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

impl ShiprocketClient {
    /// Create a new Shiprocket client.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created. This should never happen
    /// under normal circumstances as we use standard TLS configuration.
    #[must_use]
    pub fn new(base_url: &str, pool: PgPool) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        let pickup = Cache::builder()
            .max_capacity(1)
            .time_to_live(PICKUP_CACHE_TTL)
            .build();

        Self {
            inner: Arc::new(ShiprocketClientInner {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
                pool,
                token: RwLock::new(None),
                pickup,
            }),
        }
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Log in with the given credentials and cache the token on success.
    ///
    /// # Errors
    ///
    /// Returns `ShiprocketError::AuthenticationFailed` if Shiprocket rejects them.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn verify_credentials(&self, email: &str, password: &SecretString) -> Result<(), ShiprocketError> {
        let token = login(&self.inner.client, &self.inner.base_url, email, password).await?;
        *self.inner.token.write().await = Some(token);
        Ok(())
    }

    /// Forget the cached token and pickup location.
    pub async fn clear_token(&self) {
        *self.inner.token.write().await = None;
        self.inner.pickup.invalidate_all();
    }

    /// Check if a usable token is cached.
    pub async fn has_valid_token(&self) -> bool {
        self.inner
            .token
            .read()
            .await
            .as_ref()
            .is_some_and(|token| !token.is_expired())
    }

    /// The cached token, logging in with the active credentials when needed.
    async fn access_token(&self) -> Result<String, ShiprocketError> {
        if let Some(token) = self.inner.token.read().await.as_ref()
            && !token.is_expired()
        {
            return Ok(token.token.expose_secret().to_string());
        }

        let credentials = ShipmentRepository::new(&self.inner.pool)
            .active_credentials()
            .await?
            .ok_or(ShiprocketError::NotConfigured)?;

        let token = login(
            &self.inner.client,
            &self.inner.base_url,
            &credentials.email,
            &credentials.password,
        )
        .await?;
        let secret = token.token.expose_secret().to_string();
        *self.inner.token.write().await = Some(token);

        Ok(secret)
    }

    // =========================================================================
    // Request Execution
    // =========================================================================

    /// Send an authenticated request and return the JSON body.
    ///
    /// # Errors
    ///
    /// Returns `ShiprocketError::TokenExpired` on 401 (the cache is cleared),
    /// `ShiprocketError::RateLimited` on 429 and `ShiprocketError::Api` for
    /// any other non-success status.
    #[instrument(skip(self, body), fields(method = %method, path = %path))]
    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, ShiprocketError> {
        let access_token = self.access_token().await?;

        let mut request = self
            .inner
            .client
            .request(method, format!("{}{path}", self.inner.base_url))
            .bearer_auth(access_token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(ShiprocketError::RateLimited(retry_after));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.clear_token().await;
            return Err(ShiprocketError::TokenExpired);
        }

        let text = response.text().await?;
        let json: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };

        if status.is_success() {
            Ok(json)
        } else {
            let message = error_message(&json).unwrap_or_else(|| status.to_string());
            Err(ShiprocketError::Api {
                status: status.as_u16(),
                message,
                body: json,
            })
        }
    }

    // =========================================================================
    // Endpoints
    // =========================================================================

    /// The pickup location to ship from.
    ///
    /// Failures fall back to `Home` and are not cached.
    #[instrument(skip(self))]
    pub async fn pickup_location(&self) -> String {
        if let Some(location) = self.inner.pickup.get(PICKUP_KEY).await {
            return location;
        }

        match self.request(Method::GET, "/settings/company/pickup", None).await {
            Ok(body) => {
                let location = choose_pickup_location(&body);
                self.inner.pickup.insert(PICKUP_KEY, location.clone()).await;
                location
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch pickup locations, using default");
                DEFAULT_PICKUP_LOCATION.to_string()
            }
        }
    }

    /// Create an ad-hoc order and shipment.
    ///
    /// # Errors
    ///
    /// Returns `ShiprocketError` if the request fails.
    #[instrument(skip(self, payload))]
    pub async fn create_adhoc(&self, payload: &Value) -> Result<Value, ShiprocketError> {
        self.request(Method::POST, "/orders/create/adhoc", Some(payload)).await
    }

    /// Orders carrying the given channel order id.
    ///
    /// # Errors
    ///
    /// Returns `ShiprocketError` if the request fails.
    #[instrument(skip(self))]
    pub async fn orders_by_channel_id(&self, order_id: &str) -> Result<Value, ShiprocketError> {
        let path = format!("/orders?order_id={}", urlencoding::encode(order_id));
        self.request(Method::GET, &path, None).await
    }

    /// Assign an AWB, letting Shiprocket pick the courier.
    ///
    /// # Errors
    ///
    /// Returns `ShiprocketError` if the request fails.
    #[instrument(skip(self))]
    pub async fn assign_awb(&self, shipment_id: &str) -> Result<Value, ShiprocketError> {
        let body = serde_json::json!({ "shipment_id": shipment_id, "courier_id": Value::Null });
        self.request(Method::POST, "/courier/assign/awb", Some(&body)).await
    }

    /// Generate the shipping label.
    ///
    /// # Errors
    ///
    /// Returns `ShiprocketError` if the request fails.
    #[instrument(skip(self))]
    pub async fn generate_label(&self, shipment_id: &str) -> Result<Value, ShiprocketError> {
        let body = serde_json::json!({ "shipment_id": [shipment_id] });
        self.request(Method::POST, "/courier/generate/label", Some(&body)).await
    }

    /// Tracking data for an AWB.
    ///
    /// # Errors
    ///
    /// Returns `ShiprocketError` if the request fails.
    #[instrument(skip(self))]
    pub async fn track_awb(&self, awb: &str) -> Result<Value, ShiprocketError> {
        let path = format!("/courier/track/awb/{}", urlencoding::encode(awb));
        self.request(Method::GET, &path, None).await
    }

    /// Cancel a shipment.
    ///
    /// # Errors
    ///
    /// Returns `ShiprocketError` if the request fails.
    #[instrument(skip(self))]
    pub async fn cancel_shipment(&self, shipment_id: &str) -> Result<Value, ShiprocketError> {
        let path = format!("/orders/cancel/shipment/{}", urlencoding::encode(shipment_id));
        self.request(Method::POST, &path, None).await
    }

    /// Courier serviceability between two pincodes for a prepaid 0.5 kg parcel.
    ///
    /// # Errors
    ///
    /// Returns `ShiprocketError` if the request fails.
    #[instrument(skip(self))]
    pub async fn serviceability(&self, pickup_postcode: &str, delivery_postcode: &str) -> Result<Value, ShiprocketError> {
        let path = format!(
            "/courier/serviceability?pickup_postcode={}&delivery_postcode={}&cod=0&weight=0.5",
            urlencoding::encode(pickup_postcode),
            urlencoding::encode(delivery_postcode),
        );
        self.request(Method::GET, &path, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ShiprocketClient {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/nefol_test")
            .unwrap_or_else(|e| panic!("lazy pool: {e}"));
        ShiprocketClient::new("https://apiv2.shiprocket.in/v1/external/", pool)
    }

    #[tokio::test]
    async fn test_base_url_is_trimmed() {
        let client = client();
        assert_eq!(client.inner.base_url, "https://apiv2.shiprocket.in/v1/external");
        assert!(format!("{client:?}").contains("apiv2.shiprocket.in"));
    }

    #[tokio::test]
    async fn test_token_cache() {
        let client = client();
        assert!(!client.has_valid_token().await);

        *client.inner.token.write().await = Some(ShiprocketToken::issued_now("tok".to_string()));
        assert!(client.has_valid_token().await);

        client.clear_token().await;
        assert!(!client.has_valid_token().await);
    }

    #[tokio::test]
    async fn test_cached_pickup_location_is_reused() {
        let client = client();
        client.inner.pickup.insert(PICKUP_KEY, "Warehouse".to_string()).await;
        assert_eq!(client.pickup_location().await, "Warehouse");
    }
}
