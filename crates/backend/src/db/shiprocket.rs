//! Shiprocket credentials and shipment records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

use nefol_core::{OrderId, ShipmentRecordId, ShipmentStatus};

use super::{RepositoryError, not_found_on_foreign_key};
use crate::models::shipment::{Shipment, ShipmentSummary, ShipmentUpsert};

const SHIPMENT_COLUMNS: &str = "s.id, s.order_id, s.shiprocket_order_id, s.shipment_id, s.awb_code, \
     s.courier_name, s.label_url, s.tracking_url, s.status, s.created_at, s.updated_at";

/// Maximum rows returned by the shipment listing.
const SHIPMENT_LIST_LIMIT: i64 = 500;

/// Active Shiprocket account credentials.
#[derive(Clone)]
pub struct ShiprocketCredentials {
    pub email: String,
    pub password: SecretString,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for ShiprocketCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShiprocketCredentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ShipmentRow {
    id: i32,
    order_id: i32,
    shiprocket_order_id: Option<String>,
    shipment_id: Option<String>,
    awb_code: Option<String>,
    courier_name: Option<String>,
    label_url: Option<String>,
    tracking_url: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ShipmentRow> for Shipment {
    type Error = RepositoryError;

    fn try_from(row: ShipmentRow) -> Result<Self, Self::Error> {
        let status: ShipmentStatus = row
            .status
            .parse()
            .map_err(|e| RepositoryError::DataCorruption(format!("shipment {}: {e}", row.id)))?;

        Ok(Self {
            id: ShipmentRecordId::new(row.id),
            order_id: OrderId::new(row.order_id),
            shiprocket_order_id: row.shiprocket_order_id,
            shipment_id: row.shipment_id,
            awb_code: row.awb_code,
            courier_name: row.courier_name,
            label_url: row.label_url,
            tracking_url: row.tracking_url,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    #[sqlx(flatten)]
    shipment: ShipmentRow,
    order_number: String,
    customer_name: String,
    order_status: String,
    total: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialsRow {
    email: String,
    password: String,
    updated_at: DateTime<Utc>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for Shiprocket configuration and shipments.
pub struct ShipmentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShipmentRepository<'a> {
    /// Create a new shipment repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The active credentials, if configured.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active_credentials(&self) -> Result<Option<ShiprocketCredentials>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialsRow>(
            "SELECT email, password, updated_at FROM shiprocket_config \
             WHERE is_active = TRUE ORDER BY updated_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|row| ShiprocketCredentials {
            email: row.email,
            password: SecretString::from(row.password),
            updated_at: row.updated_at,
        }))
    }

    /// Store new credentials, deactivating every previous row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails.
    pub async fn save_credentials(&self, email: &str, password: &SecretString) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE shiprocket_config SET is_active = FALSE, updated_at = NOW() WHERE is_active = TRUE")
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO shiprocket_config (email, password, is_active) VALUES ($1, $2, TRUE)")
            .bind(email)
            .bind(password.expose_secret())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Insert or update the shipment of an order.
    ///
    /// Fields left `None` in `values` keep their stored value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn upsert(&self, order_id: OrderId, values: &ShipmentUpsert) -> Result<Shipment, RepositoryError> {
        let sql = format!(
            "INSERT INTO shiprocket_shipments AS s \
                (order_id, shiprocket_order_id, shipment_id, awb_code, courier_name, label_url, \
                 tracking_url, status, payload) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (order_id) DO UPDATE SET \
                shiprocket_order_id = COALESCE(EXCLUDED.shiprocket_order_id, s.shiprocket_order_id), \
                shipment_id = COALESCE(EXCLUDED.shipment_id, s.shipment_id), \
                awb_code = COALESCE(EXCLUDED.awb_code, s.awb_code), \
                courier_name = COALESCE(EXCLUDED.courier_name, s.courier_name), \
                label_url = COALESCE(EXCLUDED.label_url, s.label_url), \
                tracking_url = COALESCE(EXCLUDED.tracking_url, s.tracking_url), \
                status = EXCLUDED.status, \
                payload = EXCLUDED.payload, \
                updated_at = NOW() \
             RETURNING {SHIPMENT_COLUMNS}"
        );

        sqlx::query_as::<_, ShipmentRow>(&sql)
            .bind(order_id)
            .bind(&values.shiprocket_order_id)
            .bind(&values.shipment_id)
            .bind(&values.awb_code)
            .bind(&values.courier_name)
            .bind(&values.label_url)
            .bind(&values.tracking_url)
            .bind(values.status.as_str())
            .bind(&values.payload)
            .fetch_one(self.pool)
            .await
            .map_err(not_found_on_foreign_key)?
            .try_into()
    }

    /// The shipment recorded for an order, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn for_order(&self, order_id: OrderId) -> Result<Option<Shipment>, RepositoryError> {
        let sql = format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shiprocket_shipments s \
             WHERE s.order_id = $1 ORDER BY s.updated_at DESC LIMIT 1"
        );
        sqlx::query_as::<_, ShipmentRow>(&sql)
            .bind(order_id)
            .fetch_optional(self.pool)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    /// The shipment carrying a given AWB, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn by_awb(&self, awb: &str) -> Result<Option<Shipment>, RepositoryError> {
        let sql = format!("SELECT {SHIPMENT_COLUMNS} FROM shiprocket_shipments s WHERE s.awb_code = $1 LIMIT 1");
        sqlx::query_as::<_, ShipmentRow>(&sql)
            .bind(awb)
            .fetch_optional(self.pool)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    /// Store the AWB and label of a shipment and mark it ready to ship.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order has no shipment.
    pub async fn set_awb(
        &self,
        order_id: OrderId,
        awb_code: &str,
        courier_name: Option<&str>,
        label_url: Option<&str>,
    ) -> Result<Shipment, RepositoryError> {
        let sql = format!(
            "UPDATE shiprocket_shipments s SET \
                awb_code = $2, \
                courier_name = COALESCE($3, s.courier_name), \
                label_url = COALESCE($4, s.label_url), \
                status = $5, \
                updated_at = NOW() \
             WHERE s.order_id = $1 RETURNING {SHIPMENT_COLUMNS}"
        );
        sqlx::query_as::<_, ShipmentRow>(&sql)
            .bind(order_id)
            .bind(awb_code)
            .bind(courier_name)
            .bind(label_url)
            .bind(ShipmentStatus::ReadyToShip.as_str())
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?
            .try_into()
    }

    /// Set the local status of an order's shipment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order has no shipment.
    pub async fn set_status(&self, order_id: OrderId, status: ShipmentStatus) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shiprocket_shipments SET status = $2, updated_at = NOW() WHERE order_id = $1",
        )
        .bind(order_id)
        .bind(status.as_str())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Latest shipment per order with the order summary, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<ShipmentSummary>, RepositoryError> {
        let sql = format!(
            "SELECT DISTINCT ON (s.order_id) {SHIPMENT_COLUMNS}, \
                    o.order_number, o.customer_name, o.status AS order_status, o.total \
             FROM shiprocket_shipments s \
             JOIN orders o ON o.id = s.order_id \
             ORDER BY s.order_id, s.updated_at DESC"
        );
        let wrapped = format!(
            "SELECT * FROM ({sql}) latest ORDER BY latest.updated_at DESC LIMIT {SHIPMENT_LIST_LIMIT}"
        );

        let rows = sqlx::query_as::<_, SummaryRow>(&wrapped)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ShipmentSummary {
                    shipment: row.shipment.try_into()?,
                    order_number: row.order_number,
                    customer_name: row.customer_name,
                    order_status: row.order_status,
                    total: row.total,
                })
            })
            .collect()
    }

    /// AWB codes recorded for the given orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn awbs_for_orders(&self, order_ids: &[OrderId]) -> Result<Vec<(OrderId, String)>, RepositoryError> {
        let ids: Vec<i32> = order_ids.iter().copied().map(OrderId::as_i32).collect();
        let rows: Vec<(i32, String)> = sqlx::query_as(
            "SELECT order_id, awb_code FROM shiprocket_shipments \
             WHERE order_id = ANY($1) AND awb_code IS NOT NULL",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, awb)| (OrderId::new(id), awb))
            .collect())
    }
}
