//! Stateless display helpers layered on the canonical model.

use chrono::NaiveDate;

/// Format a count with a thousands separator.
///
/// # Examples
///
/// ```
/// use pulse_core::formatting::format_count;
///
/// assert_eq!(format_count(1234567, ','), "1,234,567");
/// assert_eq!(format_count(1234567, '.'), "1.234.567");
/// assert_eq!(format_count(999, ','), "999");
/// ```
pub fn format_count(value: u64, separator: char) -> String {
    group_thousands(&value.to_string(), separator)
}

/// [`format_count`] with the `,` separator.
pub fn format_number(value: u64) -> String {
    format_count(value, ',')
}

/// Short human form: `950`, `1.2K`, `3.4M`.
///
/// # Examples
///
/// ```
/// use pulse_core::formatting::format_compact;
///
/// assert_eq!(format_compact(950), "950");
/// assert_eq!(format_compact(1_260), "1.3K");
/// assert_eq!(format_compact(3_400_000), "3.4M");
/// ```
pub fn format_compact(value: u64) -> String {
    const UNITS: [(u64, &str); 3] = [(1_000_000_000, "B"), (1_000_000, "M"), (1_000, "K")];
    for (size, suffix) in UNITS {
        if value >= size {
            let scaled = value as f64 / size as f64;
            return format!("{scaled:.1}{suffix}");
        }
    }
    value.to_string()
}

/// Signed percentage label for a trend or delta: `+12%`, `-3%`, `0%`.
pub fn format_signed_percent(value: i64) -> String {
    if value > 0 {
        format!("+{value}%")
    } else {
        format!("{value}%")
    }
}

/// Day label such as `05 Jun 2024`.
pub fn format_day_label(date: NaiveDate) -> String {
    date.format("%d %b %Y").to_string()
}

/// Month label such as `Jun 2024`.
pub fn format_month_label(date: NaiveDate) -> String {
    date.format("%b %Y").to_string()
}

/// Insert `separator` every three digits from the right of an integer string.
fn group_thousands(s: &str, separator: char) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(separator);
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count_zero() {
        assert_eq!(format_count(0, ','), "0");
    }

    #[test]
    fn test_format_count_exact_thousands() {
        assert_eq!(format_count(1_000, ','), "1,000");
        assert_eq!(format_count(100_000, ','), "100,000");
    }

    #[test]
    fn test_format_count_locale_separator() {
        assert_eq!(format_count(12_345, '.'), "12.345");
        assert_eq!(format_count(12_345, ' '), "12 345");
    }

    #[test]
    fn test_format_number_default_separator() {
        assert_eq!(format_number(1_500), "1,500");
    }

    #[test]
    fn test_format_compact_boundaries() {
        assert_eq!(format_compact(999), "999");
        assert_eq!(format_compact(1_000), "1.0K");
        assert_eq!(format_compact(2_500_000_000), "2.5B");
    }

    #[test]
    fn test_format_signed_percent() {
        assert_eq!(format_signed_percent(12), "+12%");
        assert_eq!(format_signed_percent(-3), "-3%");
        assert_eq!(format_signed_percent(0), "0%");
    }

    #[test]
    fn test_day_and_month_labels() {
        let d = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
        assert_eq!(format_day_label(d), "05 Jun 2024");
        assert_eq!(format_month_label(d), "Jun 2024");
    }
}
