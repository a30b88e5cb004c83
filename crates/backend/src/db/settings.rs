//! Store settings (`store_settings`) stored as JSONB values by key.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use super::RepositoryError;

/// Repository for key/value store settings.
pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    /// Create a new settings repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a raw setting value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, key: &str) -> Result<Option<JsonValue>, RepositoryError> {
        let value = sqlx::query_scalar("SELECT value FROM store_settings WHERE key = $1")
            .bind(key)
            .fetch_optional(self.pool)
            .await?;
        Ok(value)
    }

    /// Get several settings at once, as `(key, value)` pairs.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, keys: &[&str]) -> Result<Vec<(String, JsonValue)>, RepositoryError> {
        let rows: Vec<(String, JsonValue)> =
            sqlx::query_as("SELECT key, value FROM store_settings WHERE key = ANY($1)")
                .bind(keys)
                .fetch_all(self.pool)
                .await?;
        Ok(rows)
    }

    /// Get a setting and deserialize it, `None` when unset.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the stored JSON does not
    /// match `T`.
    pub async fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, RepositoryError> {
        self.get(key)
            .await?
            .map(|value| {
                serde_json::from_value(value).map_err(|e| {
                    RepositoryError::DataCorruption(format!("setting {key} is malformed: {e}"))
                })
            })
            .transpose()
    }

    /// Insert or replace a setting.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set(&self, key: &str, value: &JsonValue) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO store_settings (key, value) VALUES ($1, $2) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
        )
        .bind(key)
        .bind(value)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Serialize and store a setting.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if `value` cannot be serialized.
    pub async fn set_typed<T: Serialize>(&self, key: &str, value: &T) -> Result<(), RepositoryError> {
        let json = serde_json::to_value(value)
            .map_err(|e| RepositoryError::DataCorruption(format!("setting {key}: {e}")))?;
        self.set(key, &json).await
    }
}
