//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

use rust_decimal::Decimal;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Formats an amount as rupees with Indian digit grouping.
///
/// Usage in templates: `{{ order.total|inr }}` renders `₹1,234.50`.
/// Values that are not numbers are rendered unchanged.
#[askama::filter_fn]
pub fn inr(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let raw = value.to_string();
    Ok(raw
        .trim()
        .parse::<Decimal>()
        .map_or(raw, nefol_core::format_inr))
}

/// Formats an amount with Indian digit grouping and two decimals, no symbol.
///
/// Usage in templates: `{{ view.settings.currency }}{{ line.total|amount }}`.
#[askama::filter_fn]
pub fn amount(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let raw = value.to_string();
    Ok(raw.trim().parse::<Decimal>().map_or(raw, |d| {
        nefol_core::format_inr(d).replacen('₹', "", 1)
    }))
}

