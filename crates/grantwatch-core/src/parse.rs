//! Field parsers for dates and currency amounts.
//!
//! Source text is adversarial: stray currency symbols, footnotes, ranges,
//! two-digit years. Both parsers degrade to `None` instead of guessing or
//! raising, so an unparseable field reads as "unknown" downstream.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

/// Ordered formats tried before the permissive fallback.
const DATE_FORMATS: &[&str] = &["%B %d, %Y", "%m/%d/%Y", "%Y-%m-%d"];

static FALLBACK_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})[/\-](\d{1,2})[/\-](\d{2,4})").unwrap());

/// Parse a calendar date out of free text. Tries `month-name day, year`,
/// `mm/dd/yyyy`, and `yyyy-mm-dd` in order, then falls back to a
/// permissive `d{1,2}[/-]d{1,2}[/-]d{2,4}` scan with two-digit years
/// expanded into the 2000s. Unparseable input yields `None`.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            // chrono's %Y accepts 1-3 digit years; those belong to the
            // permissive fallback, which expands them into the 2000s.
            if date.year() >= 1000 {
                return Some(date);
            }
        }
    }

    let caps = FALLBACK_DATE_RE.captures(trimmed)?;
    let month: u32 = caps[1].parse().ok()?;
    let day: u32 = caps[2].parse().ok()?;
    let year_text = &caps[3];
    let year: i32 = if year_text.len() == 2 {
        format!("20{year_text}").parse().ok()?
    } else {
        year_text.parse().ok()?
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse a monetary amount out of free text by stripping every character
/// except digits and `.`. An empty result or a malformed number yields
/// `None`; the stripped form can never be negative.
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_three_formats_agree_on_the_same_day() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        assert_eq!(parse_date("03/15/2025"), Some(expected));
        assert_eq!(parse_date("2025-03-15"), Some(expected));
        assert_eq!(parse_date("March 15, 2025"), Some(expected));
    }

    #[test]
    fn garbage_dates_yield_none() {
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("13/45/2025"), None);
    }

    #[test]
    fn fallback_scan_finds_embedded_dates() {
        let expected = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(parse_date("Applications close 6/1/25 at noon"), Some(expected));
        assert_eq!(parse_date("due 6-1-2025"), Some(expected));
    }

    #[test]
    fn two_digit_years_expand_into_the_2000s() {
        assert_eq!(
            parse_date("12/31/26"),
            Some(NaiveDate::from_ymd_opt(2026, 12, 31).unwrap())
        );
    }

    #[test]
    fn amounts_survive_symbols_and_separators() {
        assert_eq!(parse_amount("award: $12,345.67 total"), Some(12345.67));
        assert_eq!(parse_amount("$250,000"), Some(250000.0));
    }

    #[test]
    fn digitless_or_malformed_amounts_yield_none() {
        assert_eq!(parse_amount("to be determined"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("v1.2.3"), None);
    }
}
