//! Rupee amount helpers for invoices and notifications.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

const ONES: [&str; 20] = [
    "", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten", "Eleven",
    "Twelve", "Thirteen", "Fourteen", "Fifteen", "Sixteen", "Seventeen", "Eighteen", "Nineteen",
];

const TENS: [&str; 10] = [
    "", "", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy", "Eighty", "Ninety",
];

/// Words for a number below one thousand.
fn below_thousand(n: u64) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let mut n = n;
    if n >= 100 {
        parts.push(word(&ONES, n / 100));
        parts.push("Hundred");
        n %= 100;
    }
    if n >= 20 {
        parts.push(word(&TENS, n / 10));
        n %= 10;
    }
    if n > 0 {
        parts.push(word(&ONES, n));
    }
    parts.join(" ")
}

fn word<const N: usize>(table: &[&'static str; N], index: u64) -> &'static str {
    usize::try_from(index)
        .ok()
        .and_then(|i| table.get(i))
        .copied()
        .unwrap_or_default()
}

/// Spell out a rupee amount using the Indian numbering system.
///
/// Paise are dropped. Zero is `"Zero"`; every other amount ends in `" only"`,
/// e.g. `1_25_499` becomes `"One Lakh Twenty Five Thousand Four Hundred Ninety Nine only"`.
#[must_use]
pub fn amount_in_words(amount: Decimal) -> String {
    let rupees = amount.trunc().abs().to_u64().unwrap_or(0);
    if rupees == 0 {
        return "Zero".to_string();
    }

    let crore = rupees / 10_000_000;
    let lakh = (rupees % 10_000_000) / 100_000;
    let thousand = (rupees % 100_000) / 1_000;
    let hundred = (rupees % 1_000) / 100;
    let remainder = rupees % 100;

    let mut words: Vec<String> = Vec::new();
    for (value, unit) in [(crore, "Crore"), (lakh, "Lakh"), (thousand, "Thousand"), (hundred, "Hundred")] {
        if value > 0 {
            words.push(format!("{} {unit}", below_thousand(value)));
        }
    }
    if remainder > 0 {
        words.push(below_thousand(remainder));
    }

    format!("{} only", words.join(" "))
}

/// Format an amount as rupees with Indian digit grouping, e.g. `₹12,34,567.50`.
#[must_use]
pub fn format_inr(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let text = format!("{:.2}", rounded.abs());
    let (integer, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    format!("{sign}₹{}.{fraction}", group_indian(integer))
}

/// Insert commas using the 3-2-2 Indian grouping.
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, last_three) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (left, right) = rest.split_at(rest.len() - 2);
        groups.push(right);
        rest = left;
    }
    if !rest.is_empty() {
        groups.push(rest);
    }
    groups.reverse();
    format!("{},{last_three}", groups.join(","))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap_or_default()
    }

    #[test]
    fn test_zero() {
        assert_eq!(amount_in_words(Decimal::ZERO), "Zero");
        assert_eq!(amount_in_words(d("0.75")), "Zero");
    }

    #[test]
    fn test_small_amounts() {
        assert_eq!(amount_in_words(d("7")), "Seven only");
        assert_eq!(amount_in_words(d("19")), "Nineteen only");
        assert_eq!(amount_in_words(d("40")), "Forty only");
        assert_eq!(amount_in_words(d("599.99")), "Five Hundred Ninety Nine only");
    }

    #[test]
    fn test_indian_units() {
        assert_eq!(
            amount_in_words(d("125499")),
            "One Lakh Twenty Five Thousand Four Hundred Ninety Nine only"
        );
        assert_eq!(amount_in_words(d("10000000")), "One Crore only");
        assert_eq!(
            amount_in_words(d("23045006")),
            "Two Crore Thirty Lakh Forty Five Thousand Six only"
        );
    }

    #[test]
    fn test_format_inr_grouping() {
        assert_eq!(format_inr(d("0")), "₹0.00");
        assert_eq!(format_inr(d("999")), "₹999.00");
        assert_eq!(format_inr(d("1234.5")), "₹1,234.50");
        assert_eq!(format_inr(d("1234567.456")), "₹12,34,567.46");
        assert_eq!(format_inr(d("-1500")), "-₹1,500.00");
    }
}
