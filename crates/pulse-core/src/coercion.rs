//! Locale-tolerant value coercion for vendor exports.
//!
//! Every function here is total: malformed input produces a neutral value
//! (`0`, `0.0`, `None`) instead of an error, so a bad cell only ever costs the
//! caller one row.

use std::sync::OnceLock;

use chrono::{Duration, NaiveDate};
use regex::Regex;

/// Longest description kept on a [`crate::models::ContentData`].
pub const MAX_DESCRIPTION_CHARS: usize = 200;

/// Largest serial the 1900 date system can represent (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

// ── Numbers ───────────────────────────────────────────────────────────────────

/// Parse a count such as `"1,234"`, `"1.234"`, `"\"12 345\""` or `"12%"`.
///
/// Quotes, whitespace (including non-breaking spaces) and percent signs are
/// stripped. A lone separator followed by exactly three digits is treated as
/// a thousands separator. The result is rounded to the nearest integer; empty
/// or non-numeric input yields 0.
pub fn parse_number(raw: &str) -> i64 {
    canonical_decimal(raw, true)
        .map(|v| v.round() as i64)
        .unwrap_or(0)
}

/// [`parse_number`] clamped to zero, for counters that cannot be negative.
pub fn parse_count(raw: &str) -> u64 {
    parse_number(raw).max(0) as u64
}

/// Parse a percentage such as `"12,5%"` or `"3.75"`, keeping the fraction.
///
/// A lone separator is always the decimal mark here. Returns 0.0 on failure.
pub fn parse_percentage(raw: &str) -> f64 {
    canonical_decimal(raw, false).unwrap_or(0.0)
}

fn canonical_decimal(raw: &str, lone_group_is_thousands: bool) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '%' | '\u{a0}' | '\u{202f}') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');

    let normalised = match (last_comma, last_dot) {
        (Some(c), Some(d)) => {
            // Both present: whichever comes last is the decimal mark.
            let (group, decimal) = if c > d { ('.', ',') } else { (',', '.') };
            cleaned
                .chars()
                .filter(|ch| *ch != group)
                .map(|ch| if ch == decimal { '.' } else { ch })
                .collect::<String>()
        }
        (Some(_), None) => resolve_single_separator(&cleaned, ',', lone_group_is_thousands),
        (None, Some(_)) => resolve_single_separator(&cleaned, '.', lone_group_is_thousands),
        (None, None) => cleaned,
    };

    normalised.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn resolve_single_separator(s: &str, sep: char, lone_group_is_thousands: bool) -> String {
    let parts: Vec<&str> = s.split(sep).collect();
    let grouped = parts.len() > 2
        || (lone_group_is_thousands
            && parts.len() == 2
            && parts[1].len() == 3
            && parts[1].chars().all(|c| c.is_ascii_digit())
            && !parts[0].trim_start_matches('-').is_empty());

    if grouped {
        parts.concat()
    } else {
        parts.join(".")
    }
}

// ── Dates ─────────────────────────────────────────────────────────────────────

fn iso_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})(?:[T ].*)?$").expect("regex is valid")
    })
}

fn slash_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})(?:[ ,T].*)?$").expect("regex is valid")
    })
}

fn dash_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2})-(\d{1,2})-(\d{4})(?:[ T].*)?$").expect("regex is valid")
    })
}

fn serial_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(?:\.\d+)?$").expect("regex is valid"))
}

/// Normalise a date cell into a calendar day.
///
/// Accepted encodings, checked in this order:
///
/// 1. ISO datetime `YYYY-MM-DDThh:mm:ss` (or a space before the time) – date part.
/// 2. `YYYY-MM-DD`.
/// 3. US `MM/DD/YYYY`, two-digit years expanded with a `20` prefix.
/// 4. `DD-MM-YYYY`.
/// 5. Spreadsheet serial day count, see [`excel_serial_to_date`].
///
/// Anything else (including impossible calendar dates) returns `None`, which
/// callers treat as "drop this record".
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim().trim_matches('"').trim();
    if s.is_empty() {
        return None;
    }

    if let Some(caps) = iso_re().captures(s) {
        return ymd(&caps[1], &caps[2], &caps[3]);
    }

    if let Some(caps) = slash_re().captures(s) {
        let year = if caps[3].len() == 2 {
            format!("20{}", &caps[3])
        } else {
            caps[3].to_string()
        };
        return ymd(&year, &caps[1], &caps[2]);
    }

    if let Some(caps) = dash_re().captures(s) {
        return ymd(&caps[3], &caps[2], &caps[1]);
    }

    if serial_re().is_match(s) {
        return s.parse::<f64>().ok().and_then(excel_serial_to_date);
    }

    None
}

/// [`normalize_date`] rendered as `YYYY-MM-DD`, or an empty string.
pub fn normalize_date_string(raw: &str) -> String {
    normalize_date(raw)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Convert a 1900-system spreadsheet serial into a calendar day.
///
/// Serial 1 is 1900-01-01. The 1900 system counts a non-existent 1900-02-29
/// as serial 60, so serials from 61 onward are offset from 1899-12-30 while
/// earlier ones are offset from 1899-12-31. Any fractional (time) part is
/// discarded.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let days = serial.floor() as i64;
    let epoch = if days >= 61 {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    };
    epoch.checked_add_signed(Duration::days(days))
}

/// Parse the compact `YYYYMMDD` form used by the remote analytics API.
pub fn compact_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.len() != 8 || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y%m%d").ok()
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

// ── Text ──────────────────────────────────────────────────────────────────────

/// Keep at most `max` Unicode scalar values of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    // ── parse_number ──────────────────────────────────────────────────────────

    #[test]
    fn test_parse_number_plain_and_quoted() {
        assert_eq!(parse_number("42"), 42);
        assert_eq!(parse_number("\"42\""), 42);
        assert_eq!(parse_number("  7 "), 7);
    }

    #[test]
    fn test_parse_number_thousands_separators() {
        assert_eq!(parse_number("1,234"), 1234);
        assert_eq!(parse_number("1.234"), 1234);
        assert_eq!(parse_number("1.234.567"), 1_234_567);
        assert_eq!(parse_number("12 345"), 12_345);
        assert_eq!(parse_number("12\u{a0}345"), 12_345);
    }

    #[test]
    fn test_parse_number_mixed_separators() {
        assert_eq!(parse_number("1,234.6"), 1235);
        assert_eq!(parse_number("1.234,4"), 1234);
    }

    #[test]
    fn test_parse_number_decimal_rounds() {
        assert_eq!(parse_number("2.5"), 3);
        assert_eq!(parse_number("2,49"), 2);
    }

    #[test]
    fn test_parse_number_percent_stripped() {
        assert_eq!(parse_number("15%"), 15);
    }

    #[test]
    fn test_parse_number_garbage_is_zero() {
        assert_eq!(parse_number(""), 0);
        assert_eq!(parse_number("n/a"), 0);
        assert_eq!(parse_number("--"), 0);
        assert_eq!(parse_number("inf"), 0);
    }

    #[test]
    fn test_parse_count_clamps_negative() {
        assert_eq!(parse_number("-12"), -12);
        assert_eq!(parse_count("-12"), 0);
        assert_eq!(parse_count("1,000"), 1000);
    }

    // ── parse_percentage ──────────────────────────────────────────────────────

    #[test]
    fn test_parse_percentage_keeps_fraction() {
        assert!((parse_percentage("12,5%") - 12.5).abs() < 1e-9);
        assert!((parse_percentage("3.125") - 3.125).abs() < 1e-9);
        assert!((parse_percentage("1,234.5%") - 1234.5).abs() < 1e-9);
        assert_eq!(parse_percentage("abc"), 0.0);
    }

    // ── normalize_date ────────────────────────────────────────────────────────

    #[test]
    fn test_normalize_iso_datetime() {
        assert_eq!(normalize_date("2025-01-01T00:00:00"), Some(day("2025-01-01")));
        assert_eq!(normalize_date("2025-01-01 13:45"), Some(day("2025-01-01")));
    }

    #[test]
    fn test_normalize_iso_date_passthrough() {
        assert_eq!(normalize_date_string("2024-06-05"), "2024-06-05");
    }

    #[test]
    fn test_normalize_slash_us_order() {
        assert_eq!(normalize_date_string("6/5/2024"), "2024-06-05");
        assert_eq!(normalize_date_string("6/5/24"), "2024-06-05");
        assert_eq!(normalize_date_string("12/31/2023 10:00 am"), "2023-12-31");
    }

    #[test]
    fn test_normalize_dash_day_first() {
        assert_eq!(normalize_date_string("05-06-2024"), "2024-06-05");
        assert_eq!(normalize_date_string("31-12-2023"), "2023-12-31");
    }

    #[test]
    fn test_normalize_excel_serial() {
        assert_eq!(normalize_date_string("45292"), "2024-01-01");
        assert_eq!(normalize_date_string("45292.75"), "2024-01-01");
        assert_eq!(excel_serial_to_date(1.0), Some(day("1900-01-01")));
        assert_eq!(excel_serial_to_date(61.0), Some(day("1900-03-01")));
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert_eq!(normalize_date(""), None);
        assert_eq!(normalize_date("yesterday"), None);
        assert_eq!(normalize_date("2024-02-30"), None);
        assert_eq!(normalize_date("13/01/2024"), None);
        assert_eq!(normalize_date("0"), None);
        assert_eq!(normalize_date_string("Total"), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in ["2025-01-01T00:00:00", "6/5/24", "05-06-2024", "45292"] {
            let once = normalize_date_string(raw);
            assert_eq!(normalize_date_string(&once), once, "input {raw}");
        }
    }

    #[test]
    fn test_compact_date() {
        assert_eq!(compact_date("20240131"), Some(day("2024-01-31")));
        assert_eq!(compact_date("2024-01-31"), None);
        assert_eq!(compact_date("20241341"), None);
    }

    // ── truncate_chars ────────────────────────────────────────────────────────

    #[test]
    fn test_truncate_chars_counts_code_points() {
        assert_eq!(truncate_chars("ñandú", 3), "ñan");
        assert_eq!(truncate_chars("short", 200), "short");
    }
}
