//! Cross-platform aggregation into one unified daily series.
//!
//! Platform exclusivity is a selection policy applied by the caller (see
//! [`pulse_core::models::apply_exclusive_selection`]); the aggregator folds in
//! whatever subset it is handed.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use pulse_core::models::{
    AggregatedReport, CombinedDay, CombinedMetric, CombinedMetrics, DateRange, Platform,
    PlatformBundle, PlatformData,
};
use tracing::debug;

/// Label used for reports that are not restricted to a date range.
pub const ALL_DATES_LABEL: &str = "all";

// ── CrossPlatformAggregator ───────────────────────────────────────────────────

/// Stateless helper that merges per-platform series by calendar date.
pub struct CrossPlatformAggregator;

impl CrossPlatformAggregator {
    /// Combine the `selected` platforms of `bundle`.
    ///
    /// Without a `range`, totals are the sum of each platform's stored stats
    /// totals. With a `range`, every series is first filtered to it and totals
    /// are recomputed from the filtered points. Selected platforms missing from
    /// the bundle are skipped; duplicates in the selection count once.
    pub fn aggregate(
        bundle: &PlatformBundle,
        selected: &[Platform],
        range: Option<DateRange>,
    ) -> AggregatedReport {
        let mut platforms: Vec<Platform> = Vec::new();
        for platform in selected {
            if platforms.contains(platform) {
                continue;
            }
            if bundle.contains_key(platform) {
                platforms.push(*platform);
            } else {
                debug!("no data loaded for selected platform {}", platform);
            }
        }

        let mut totals = CombinedMetrics::default();
        let mut days: BTreeMap<NaiveDate, CombinedDay> = BTreeMap::new();

        for platform in &platforms {
            let Some(data) = bundle.get(platform) else {
                continue;
            };
            Self::fold_platform(data, range.as_ref(), &mut totals, &mut days);
        }

        let daily: Vec<CombinedDay> = days.into_values().collect();
        debug!(
            platforms = platforms.len(),
            days = daily.len(),
            "aggregated report"
        );

        AggregatedReport {
            totals,
            daily,
            platforms,
            date_range: range.map_or_else(|| ALL_DATES_LABEL.to_string(), |r| r.label()),
        }
    }

    /// Sum the unified daily series into combined totals.
    pub fn calculate_totals(daily: &[CombinedDay]) -> CombinedMetrics {
        let mut totals = CombinedMetrics::default();
        for day in daily {
            for metric in CombinedMetric::ALL {
                totals.add(metric, day.metrics.get(metric));
            }
        }
        totals
    }

    // ── Private ───────────────────────────────────────────────────────────────

    fn fold_platform(
        data: &PlatformData,
        range: Option<&DateRange>,
        totals: &mut CombinedMetrics,
        days: &mut BTreeMap<NaiveDate, CombinedDay>,
    ) {
        for metric in CombinedMetric::ALL {
            let Some(series) = data.series(metric.source_metric()) else {
                continue;
            };

            match range {
                None => {
                    totals.add(metric, series.stats.total);
                    for point in &series.points {
                        days.entry(point.date)
                            .or_insert_with(|| CombinedDay::empty(point.date))
                            .metrics
                            .add(metric, point.value);
                    }
                }
                Some(range) => {
                    for point in series.points_within(range) {
                        totals.add(metric, point.value);
                        days.entry(point.date)
                            .or_insert_with(|| CombinedDay::empty(point.date))
                            .metrics
                            .add(metric, point.value);
                    }
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
