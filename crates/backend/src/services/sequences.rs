//! Order and invoice number generation.
//!
//! Numbers carry the issue date in India Standard Time:
//!
//! - Order number: `N-09{DDMMYY}{seq4}`, e.g. `N-093011251001`
//! - Invoice number: `{DDMMYY}{seq8}`, 14 digits, e.g. `30112500000001`
//! - Legacy invoice number: `IN-{NNN}` per financial year, e.g. `IN-007`
//!
//! When a counter cannot be advanced the sequence part falls back to the
//! trailing digits of the current unix-millis timestamp so checkout never
//! fails on numbering.

use chrono::{DateTime, Datelike, FixedOffset, Offset, Utc};
use sqlx::PgPool;
use tracing::{instrument, warn};

use nefol_core::region::HOME_STATE_CODE;

use crate::db::{OrderRepository, RepositoryError, SequenceRepository};
use crate::models::order::Order;

/// Prefix shared by every order number.
const ORDER_PREFIX: &str = "N";

/// IST is UTC+05:30.
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Convert a UTC instant to India Standard Time.
#[must_use]
pub fn to_ist(at: DateTime<Utc>) -> DateTime<FixedOffset> {
    let ist = FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
    at.with_timezone(&ist)
}

/// `DDMMYY` in IST.
#[must_use]
pub fn date_stamp(at: DateTime<Utc>) -> String {
    to_ist(at).format("%d%m%y").to_string()
}

/// Format an order number from its date and counter value.
#[must_use]
pub fn format_order_number(at: DateTime<Utc>, sequence: i64) -> String {
    format!("{ORDER_PREFIX}-{HOME_STATE_CODE}{}{sequence:04}", date_stamp(at))
}

/// Format a 14-digit invoice number from its date and counter value.
#[must_use]
pub fn format_invoice_number(at: DateTime<Utc>, sequence: i64) -> String {
    format!("{}{sequence:08}", date_stamp(at))
}

/// Format a legacy invoice number.
#[must_use]
pub fn format_legacy_invoice_number(sequence: i32) -> String {
    format!("IN-{sequence:03}")
}

/// Financial-year label `{year-1}-{yy}` for the calendar year of `at`.
#[must_use]
pub fn financial_year(at: DateTime<Utc>) -> String {
    let year = to_ist(at).year();
    format!("{}-{:02}", year - 1, year.rem_euclid(100))
}

/// The last `digits` digits of the unix-millis timestamp, zero padded.
#[must_use]
pub fn timestamp_fallback(at: DateTime<Utc>, digits: u32) -> i64 {
    at.timestamp_millis().rem_euclid(10_i64.pow(digits))
}

/// Generate the next order number.
///
/// Falls back to a timestamp-derived sequence when the counter fails.
#[instrument(skip(pool))]
pub async fn next_order_number(pool: &PgPool) -> String {
    let now = Utc::now();
    let sequence = match SequenceRepository::new(pool).next_order_sequence().await {
        Ok(seq) => i64::from(seq),
        Err(e) => {
            warn!(error = %e, "Order sequence unavailable, using timestamp fallback");
            timestamp_fallback(now, 4)
        }
    };
    format_order_number(now, sequence)
}

/// Generate the next 14-digit invoice number.
///
/// Falls back to a timestamp-derived sequence when the counter fails.
#[instrument(skip(pool))]
pub async fn next_invoice_number(pool: &PgPool) -> String {
    let now = Utc::now();
    let sequence = match SequenceRepository::new(pool).next_invoice_sequence().await {
        Ok(seq) => seq,
        Err(e) => {
            warn!(error = %e, "Invoice sequence unavailable, using timestamp fallback");
            timestamp_fallback(now, 8)
        }
    };
    format_invoice_number(now, sequence)
}

/// Return the order's invoice number, issuing and storing a legacy one when
/// the order has none.
///
/// # Errors
///
/// Returns `RepositoryError` if the number cannot be issued or stored.
#[instrument(skip(pool, order), fields(order_id = %order.id))]
pub async fn get_or_generate_invoice_number(pool: &PgPool, order: &Order) -> Result<String, RepositoryError> {
    if let Some(number) = order.invoice_number.as_deref().filter(|n| !n.is_empty()) {
        return Ok(number.to_string());
    }

    let fy = financial_year(Utc::now());
    let number = SequenceRepository::new(pool)
        .issue_legacy_number(order.id, &fy, format_legacy_invoice_number)
        .await?;
    OrderRepository::new(pool)
        .set_invoice_number(order.id, &number)
        .await?;

    tracing::info!(invoice_number = %number, "Issued legacy invoice number");
    Ok(number)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_order_number_format() {
        let number = format_order_number(at("2025-11-30T06:00:00Z"), 1001);
        assert_eq!(number, "N-093011251001");
    }

    #[test]
    fn test_order_number_pads_small_sequences() {
        assert_eq!(format_order_number(at("2025-01-05T06:00:00Z"), 7), "N-090501250007");
    }

    #[test]
    fn test_date_stamp_uses_ist() {
        // 20:00 UTC is already the next day in India
        assert_eq!(date_stamp(at("2025-03-31T20:00:00Z")), "010425");
    }

    #[test]
    fn test_invoice_number_is_fourteen_digits() {
        let number = format_invoice_number(at("2025-11-30T06:00:00Z"), 1);
        assert_eq!(number, "30112500000001");
        assert_eq!(number.len(), 14);
        assert!(number.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_legacy_invoice_number() {
        assert_eq!(format_legacy_invoice_number(7), "IN-007");
        assert_eq!(format_legacy_invoice_number(1234), "IN-1234");
    }

    #[test]
    fn test_financial_year_label() {
        assert_eq!(financial_year(at("2025-06-01T00:00:00Z")), "2024-25");
        assert_eq!(financial_year(at("2030-01-15T00:00:00Z")), "2029-30");
    }

    #[test]
    fn test_timestamp_fallback_digits() {
        let t = at("2025-06-01T00:00:00.123Z");
        assert!(timestamp_fallback(t, 4) < 10_000);
        assert!(timestamp_fallback(t, 8) < 100_000_000);
        assert_eq!(timestamp_fallback(t, 4), t.timestamp_millis() % 10_000);
    }
}
