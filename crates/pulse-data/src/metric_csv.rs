//! Single-metric daily exports (one `date,value` series per file).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use pulse_core::coercion::{normalize_date, parse_count};
use pulse_core::models::{DataPoint, Metric, MetricSeries};
use tracing::debug;

use crate::headers::{locate_header, ColumnMap, Field, METRIC_CSV_ALIASES};
use crate::sanitize::read_delimited;

/// Parses delimited daily exports where the caller knows which metric the
/// file holds.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricCsvParser;

impl MetricCsvParser {
    pub fn new() -> Self {
        Self
    }

    /// Structural pre-check: a date header is found and at least one record
    /// follows it.
    pub fn has_valid_data(&self, text: &str) -> bool {
        let rows = read_delimited(text).rows;
        matches!(
            locate_header(&rows, METRIC_CSV_ALIASES, &[Field::Date]),
            Some((idx, _)) if rows.len() > idx + 1
        )
    }

    /// Parse `text` into a date-sorted series for `metric`.
    ///
    /// Rows whose date cannot be normalised are skipped; rows on the same day
    /// are summed. A file without a recognisable header yields an empty series.
    pub fn parse(&self, text: &str, metric: Metric) -> MetricSeries {
        let rows = read_delimited(text).rows;
        let Some((header_idx, mut map)) = locate_header(&rows, METRIC_CSV_ALIASES, &[Field::Date])
        else {
            debug!("{}: no date header in the first rows", metric);
            return MetricSeries::default();
        };

        if !map.has(Field::Value) {
            if let Some(idx) = fallback_value_column(&rows[header_idx], &map) {
                map.insert(Field::Value, idx);
            }
        }

        let mut by_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        let mut read = 0usize;
        let mut skipped = 0usize;

        for row in &rows[header_idx + 1..] {
            read += 1;
            let Some(date) = map.cell(row, Field::Date).and_then(normalize_date) else {
                skipped += 1;
                continue;
            };
            let value = map.cell(row, Field::Value).map(parse_count).unwrap_or(0);
            let day = by_day.entry(date).or_insert(0);
            *day = day.saturating_add(value);
        }

        let points: Vec<DataPoint> = by_day
            .into_iter()
            .map(|(date, value)| DataPoint::new(date, value))
            .collect();

        debug!(
            metric = %metric,
            rows_read = read,
            rows_skipped = skipped,
            points = points.len(),
            "parsed metric export"
        );

        MetricSeries::from_points(points)
    }
}

/// First column of the header row that is not the date column.
fn fallback_value_column(header: &[String], map: &ColumnMap) -> Option<usize> {
    let date_idx = map.get(Field::Date)?;
    (0..header.len()).find(|i| *i != date_idx)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
