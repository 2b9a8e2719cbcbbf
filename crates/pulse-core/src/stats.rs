//! Summary statistics over a canonical daily series.
//!
//! Three trend definitions coexist and are deliberately kept apart:
//!
//! * [`mean_difference_trend`] – raw difference between the means of the
//!   second and first half of the series. Used by [`calculate_stats`], the
//!   delimited parsers and the spreadsheet metrics sheet.
//! * [`percentage_trend`] – the same halves, expressed as a percentage of the
//!   first half. Used by the spreadsheet fallback path that derives metrics
//!   from content rows.
//! * [`period_over_period_trend`] – percentage change of a period total against
//!   the immediately preceding period. Used by the remote analytics adapter.

use crate::models::{DataPoint, DataStats};

/// Which series-based trend definition to attach to a [`DataStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrendKind {
    #[default]
    MeanDifference,
    Percentage,
}

/// Compute total / average / max / min / trend for `series`.
///
/// The input may be in any order; it is sorted by date before the midpoint
/// split. An empty series yields all-zero stats.
pub fn calculate_stats(series: &[DataPoint]) -> DataStats {
    calculate_stats_with(series, TrendKind::MeanDifference)
}

/// Same as [`calculate_stats`] with an explicit trend definition.
pub fn calculate_stats_with(series: &[DataPoint], kind: TrendKind) -> DataStats {
    if series.is_empty() {
        return DataStats::default();
    }

    let sorted = sorted_by_date(series);
    let total = saturating_total(sorted.iter().map(|p| p.value));
    let average = (total as f64 / sorted.len() as f64).round() as u64;
    let max = sorted.iter().map(|p| p.value).max().unwrap_or(0);
    let min = sorted.iter().map(|p| p.value).min().unwrap_or(0);

    let trend = match kind {
        TrendKind::MeanDifference => mean_difference_trend(&sorted),
        TrendKind::Percentage => percentage_trend(&sorted),
    };

    DataStats {
        total,
        average,
        max,
        min,
        trend,
    }
}

/// `round(mean(second half) - mean(first half))`, split at `floor(n / 2)`.
///
/// Returns 0 when either half is empty.
pub fn mean_difference_trend(series: &[DataPoint]) -> i64 {
    match half_means(series) {
        Some((first, second)) => (second - first).round() as i64,
        None => 0,
    }
}

/// `round((second - first) / first * 100)` over the same halves as
/// [`mean_difference_trend`]; 0 when the first-half mean is not positive.
pub fn percentage_trend(series: &[DataPoint]) -> i64 {
    match half_means(series) {
        Some((first, second)) if first > 0.0 => ((second - first) / first * 100.0).round() as i64,
        _ => 0,
    }
}

/// Percentage change of `current` against `previous`; 0 when `previous` is 0.
pub fn period_over_period_trend(current: u64, previous: u64) -> i64 {
    if previous == 0 {
        return 0;
    }
    ((current as f64 - previous as f64) / previous as f64 * 100.0).round() as i64
}

/// Sum of counts, clamped at `u64::MAX`.
pub fn saturating_total(values: impl IntoIterator<Item = u64>) -> u64 {
    values.into_iter().fold(0, u64::saturating_add)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn sorted_by_date(series: &[DataPoint]) -> Vec<DataPoint> {
    let mut sorted = series.to_vec();
    sorted.sort_by_key(|p| p.date);
    sorted
}

/// Means of `[0, n/2)` and `[n/2, n)` of the date-sorted series.
fn half_means(series: &[DataPoint]) -> Option<(f64, f64)> {
    let sorted = sorted_by_date(series);
    let mid = sorted.len() / 2;
    let (first, second) = sorted.split_at(mid);
    Some((mean(first)?, mean(second)?))
}

fn mean(points: &[DataPoint]) -> Option<f64> {
    if points.is_empty() {
        return None;
    }
    let sum = saturating_total(points.iter().map(|p| p.value));
    Some(sum as f64 / points.len() as f64)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn series(values: &[(&str, u64)]) -> Vec<DataPoint> {
        values
            .iter()
            .map(|(d, v)| {
                DataPoint::new(NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap(), *v)
            })
            .collect()
    }

    #[test]
    fn test_empty_series_is_all_zero() {
        assert_eq!(calculate_stats(&[]), DataStats::default());
        assert_eq!(
            calculate_stats_with(&[], TrendKind::Percentage),
            DataStats::default()
        );
    }

    #[test]
    fn test_three_points_floor_midpoint() {
        let s = series(&[
            ("2025-01-01", 100),
            ("2025-01-02", 200),
            ("2025-01-03", 300),
        ]);
        let stats = calculate_stats(&s);
        assert_eq!(stats.total, 600);
        assert_eq!(stats.average, 200);
        assert_eq!(stats.max, 300);
        assert_eq!(stats.min, 100);
        // first half [100], second half [200, 300] -> 250 - 100
        assert_eq!(stats.trend, 150);
    }

    #[test]
    fn test_single_point_has_zero_trend() {
        let s = series(&[("2025-01-01", 42)]);
        let stats = calculate_stats(&s);
        assert_eq!(stats.total, 42);
        assert_eq!(stats.average, 42);
        assert_eq!(stats.trend, 0);
    }

    #[test]
    fn test_order_independent() {
        let ordered = series(&[
            ("2025-01-01", 10),
            ("2025-01-02", 20),
            ("2025-01-03", 5),
            ("2025-01-04", 40),
        ]);
        let mut shuffled = ordered.clone();
        shuffled.reverse();
        shuffled.swap(0, 2);
        assert_eq!(calculate_stats(&ordered), calculate_stats(&shuffled));
    }

    #[test]
    fn test_average_rounds_half_up() {
        let s = series(&[("2025-01-01", 1), ("2025-01-02", 2)]);
        assert_eq!(calculate_stats(&s).average, 2);
    }

    #[test]
    fn test_negative_trend() {
        let s = series(&[("2025-01-01", 300), ("2025-01-02", 100)]);
        assert_eq!(mean_difference_trend(&s), -200);
    }

    #[test]
    fn test_percentage_trend() {
        let s = series(&[("2024-01-01", 15), ("2024-01-02", 20)]);
        // (20 - 15) / 15 * 100 = 33.3
        assert_eq!(percentage_trend(&s), 33);
        let stats = calculate_stats_with(&s, TrendKind::Percentage);
        assert_eq!(stats.trend, 33);
        assert_eq!(stats.total, 35);
    }

    #[test]
    fn test_percentage_trend_zero_first_half() {
        let s = series(&[("2024-01-01", 0), ("2024-01-02", 20)]);
        assert_eq!(percentage_trend(&s), 0);
    }

    #[test]
    fn test_period_over_period_trend() {
        assert_eq!(period_over_period_trend(150, 100), 50);
        assert_eq!(period_over_period_trend(50, 100), -50);
        assert_eq!(period_over_period_trend(10, 0), 0);
        assert_eq!(period_over_period_trend(0, 0), 0);
    }

    #[test]
    fn test_stats_rederivable_from_series() {
        let s = series(&[
            ("2025-02-01", 7),
            ("2025-02-02", 13),
            ("2025-02-03", 0),
            ("2025-02-04", 99),
            ("2025-02-05", 1),
        ]);
        let stats = calculate_stats(&s);
        let total: u64 = s.iter().map(|p| p.value).sum();
        assert_eq!(stats.total, total);
        assert_eq!(stats.max, s.iter().map(|p| p.value).max().unwrap());
        assert_eq!(stats.min, s.iter().map(|p| p.value).min().unwrap());
        assert_eq!(
            stats.average,
            (total as f64 / s.len() as f64).round() as u64
        );
    }

    #[test]
    fn test_saturating_total_clamps() {
        assert_eq!(saturating_total([1, 2, 3]), 6);
        assert_eq!(saturating_total([u64::MAX - 1, 5, 7]), u64::MAX);
        assert_eq!(saturating_total(std::iter::empty()), 0);
    }
}
