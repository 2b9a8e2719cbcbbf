//! Anomaly detection within a report and comparison between two reports.
//!
//! Alert ids are deterministic (`anomaly:{metric}:{date}` and
//! `comparison:{metric}:{current}:{previous}`), so batches computed over
//! overlapping windows can be merged with [`dedupe_alerts`].

use std::collections::HashSet;

use pulse_core::formatting::{format_number, format_signed_percent};
use pulse_core::models::{AggregatedReport, AlertKind, CombinedMetric, MetricAlert, Severity};
use pulse_core::settings::AnomalyConfig;
use tracing::debug;

/// Flag days that deviate from their trailing baseline.
///
/// For every combined metric, each day with at least `min_baseline_points`
/// preceding entries in the unified series is compared to the mean of up to
/// `baseline_window_days` of them. A zero baseline is never judged.
pub fn detect_anomalies(report: &AggregatedReport, config: &AnomalyConfig) -> Vec<MetricAlert> {
    let mut alerts = Vec::new();

    for metric in CombinedMetric::ALL {
        let series = report.series(metric);
        for (i, point) in series.iter().enumerate() {
            let start = i.saturating_sub(config.baseline_window_days);
            let window = &series[start..i];
            if window.len() < config.min_baseline_points {
                continue;
            }

            let baseline = window.iter().map(|p| p.value as f64).sum::<f64>() / window.len() as f64;
            if baseline <= 0.0 {
                continue;
            }

            let deviation = (point.value as f64 - baseline) / baseline * 100.0;
            if deviation.abs() <= config.spike_threshold_pct {
                continue;
            }

            let kind = if deviation > 0.0 {
                AlertKind::Spike
            } else {
                AlertKind::Drop
            };
            alerts.push(MetricAlert {
                id: format!("anomaly:{}:{}", metric, point.date),
                metric,
                kind,
                severity: severity(kind, deviation, config.spike_threshold_pct, config),
                description: format!(
                    "{} on {} was {} ({} vs the {}-day average of {})",
                    metric.label(),
                    point.date,
                    format_number(point.value),
                    format_signed_percent(deviation.round() as i64),
                    window.len(),
                    format_number(baseline.round() as u64),
                ),
            });
        }
    }

    debug!(alerts = alerts.len(), "anomaly scan complete");
    alerts
}

/// Compare the combined totals of `current` against `previous`.
///
/// A metric whose previous total is zero is not compared.
pub fn compare_reports(
    current: &AggregatedReport,
    previous: &AggregatedReport,
    config: &AnomalyConfig,
) -> Vec<MetricAlert> {
    let mut alerts = Vec::new();

    for metric in CombinedMetric::ALL {
        let now = current.totals.get(metric);
        let before = previous.totals.get(metric);
        if before == 0 {
            continue;
        }

        let delta = (now as f64 - before as f64) / before as f64 * 100.0;
        if delta.abs() <= config.comparison_threshold_pct {
            continue;
        }

        let kind = if delta > 0.0 {
            AlertKind::Growth
        } else {
            AlertKind::Decline
        };
        alerts.push(MetricAlert {
            id: format!(
                "comparison:{}:{}:{}",
                metric, current.date_range, previous.date_range
            ),
            metric,
            kind,
            severity: severity(kind, delta, config.comparison_threshold_pct, config),
            description: format!(
                "{} {} from {} to {} ({})",
                metric.label(),
                if kind == AlertKind::Growth {
                    "grew"
                } else {
                    "declined"
                },
                format_number(before),
                format_number(now),
                format_signed_percent(delta.round() as i64),
            ),
        });
    }

    alerts
}

fn severity(kind: AlertKind, change_pct: f64, threshold: f64, config: &AnomalyConfig) -> Severity {
    match kind {
        AlertKind::Spike | AlertKind::Growth => Severity::Info,
        AlertKind::Drop | AlertKind::Decline => {
            if change_pct.abs() >= threshold * config.critical_multiplier {
                Severity::Critical
            } else {
                Severity::Warning
            }
        }
    }
}

/// Drop alerts whose id was already seen. First occurrence wins; order is
/// preserved.
pub fn dedupe_alerts(alerts: impl IntoIterator<Item = MetricAlert>) -> Vec<MetricAlert> {
    let mut seen = HashSet::new();
    alerts
        .into_iter()
        .filter(|a| seen.insert(a.id.clone()))
        .collect()
}

/// Concatenate two batches and deduplicate.
pub fn merge_alerts(first: Vec<MetricAlert>, second: Vec<MetricAlert>) -> Vec<MetricAlert> {
    dedupe_alerts(first.into_iter().chain(second))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
