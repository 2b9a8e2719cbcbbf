//! Multi-sheet workbook exports (daily metrics sheet + one row per post).
//!
//! The container is opened with `calamine` into an in-memory [`Workbook`] of
//! string cells; everything after that works on plain rows, so most of the
//! mapping logic is tested on hand-built sheets.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDate;
use pulse_core::coercion::{normalize_date, parse_count};
use pulse_core::error::{PulseError, Result};
use pulse_core::models::{ContentData, DataPoint, Metric, MetricSeries, PlatformData};
use pulse_core::settings::DEFAULT_MAX_SPREADSHEET_BYTES;
use pulse_core::stats::{calculate_stats_with, saturating_total, TrendKind};
use tracing::{debug, warn};

use crate::content::{content_rows, CONTENT_MARKERS};
use crate::headers::{locate_header, ColumnMap, Field, CONTENT_ALIASES, SHEET_METRICS_ALIASES};

/// Accepted names for the daily metrics sheet, in preference order.
pub const METRICS_SHEET_NAMES: &[&str] = &["Metrics", "Métricas", "Indicadores"];

/// Accepted names for the per-post sheet, in preference order.
pub const CONTENT_SHEET_NAMES: &[&str] = &[
    "All posts",
    "Todas las publicaciones",
    "Posts",
    "Publicaciones",
];

const ACCEPTED_EXTENSIONS: &[&str] = &["xlsx", "xls"];

// ── Workbook ──────────────────────────────────────────────────────────────────

/// One named sheet of string cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

/// An opened workbook, sheets in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    /// Open an `xlsx`/`xls` container from memory.
    ///
    /// Fully empty rows are dropped. A sheet that fails to load is skipped
    /// with a warning; a container that cannot be opened at all is an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut book = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| PulseError::Spreadsheet(e.to_string()))?;

        let mut sheets = Vec::new();
        for name in book.sheet_names() {
            let range = match book.worksheet_range(&name) {
                Ok(range) => range,
                Err(e) => {
                    warn!("skipping unreadable sheet {:?}: {}", name, e);
                    continue;
                }
            };
            let rows: Vec<Vec<String>> = range
                .rows()
                .map(|r| r.iter().map(cell_to_string).collect::<Vec<_>>())
                .filter(|r| r.iter().any(|c| !c.is_empty()))
                .collect();
            sheets.push(Sheet::new(name, rows));
        }

        Ok(Self { sheets })
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    /// First sheet matching `candidates`: exact names in order, then a
    /// case-insensitive pass.
    pub fn find_sheet(&self, candidates: &[&str]) -> Option<&Sheet> {
        candidates
            .iter()
            .find_map(|c| self.sheets.iter().find(|s| s.name == *c))
            .or_else(|| {
                candidates.iter().find_map(|c| {
                    let wanted = c.to_lowercase();
                    self.sheets
                        .iter()
                        .find(|s| s.name.trim().to_lowercase() == wanted)
                })
            })
    }
}

/// Render a cell as text. Whole floats lose their `.0`; date cells become
/// their serial number.
///
/// Fractional floats always carry six decimals, so a value such as `12.345`
/// cannot be read back as a thousands-grouped `12345`.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Int(i) => i.to_string(),
        Data::Float(f) => float_to_string(*f),
        Data::String(s) => s.trim().to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => float_to_string(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) | Data::Empty => String::new(),
    }
}

fn float_to_string(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else if f.fract() == 0.0 {
        f.to_string()
    } else {
        format!("{f:.6}")
    }
}

// ── Upload validation ─────────────────────────────────────────────────────────

/// Reject files by extension or size before any parsing is attempted.
pub fn validate_upload(file_name: &str, size_bytes: u64, max_bytes: u64) -> Result<()> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some(ext) if ACCEPTED_EXTENSIONS.contains(&ext) => {}
        Some(ext) => {
            return Err(PulseError::UnsupportedFile {
                name: file_name.to_string(),
                reason: format!("extension .{ext} is not a spreadsheet (expected .xlsx or .xls)"),
            })
        }
        None => {
            return Err(PulseError::UnsupportedFile {
                name: file_name.to_string(),
                reason: "missing file extension (expected .xlsx or .xls)".to_string(),
            })
        }
    }

    if size_bytes > max_bytes {
        return Err(PulseError::FileTooLarge {
            name: file_name.to_string(),
            size: size_bytes,
            max: max_bytes,
        });
    }

    Ok(())
}

// ── SpreadsheetParser ─────────────────────────────────────────────────────────

/// Parses the two-sheet workbook export into one [`PlatformData`].
#[derive(Debug, Clone, Copy)]
pub struct SpreadsheetParser {
    max_bytes: u64,
}

impl Default for SpreadsheetParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SPREADSHEET_BYTES)
    }
}

impl SpreadsheetParser {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn validate_upload(&self, file_name: &str, size_bytes: u64) -> Result<()> {
        validate_upload(file_name, size_bytes, self.max_bytes)
    }

    /// Validate, open and parse a workbook held in memory.
    pub fn parse_bytes(&self, file_name: &str, bytes: &[u8]) -> Result<PlatformData> {
        self.validate_upload(file_name, bytes.len() as u64)?;
        let workbook = Workbook::from_bytes(bytes)?;
        Ok(self.parse_workbook(&workbook))
    }

    /// Map both sheets. When the metrics sheet is missing or yields nothing,
    /// daily series are derived from the content rows instead.
    pub fn parse_workbook(&self, workbook: &Workbook) -> PlatformData {
        let mut data = PlatformData::default();

        let content = match workbook.find_sheet(CONTENT_SHEET_NAMES) {
            Some(sheet) => parse_content_sheet(sheet),
            None => {
                debug!("workbook has no content sheet");
                Vec::new()
            }
        };

        let metrics = match workbook.find_sheet(METRICS_SHEET_NAMES) {
            Some(sheet) => parse_metrics_sheet(sheet),
            None => {
                debug!("workbook has no metrics sheet");
                BTreeMap::new()
            }
        };

        if metrics.values().all(MetricSeries::is_empty) && !content.is_empty() {
            debug!(
                items = content.len(),
                "deriving daily metrics from content rows"
            );
            for (metric, series) in derive_from_content(&content) {
                data.set_series(metric, series);
            }
        } else {
            for (metric, series) in metrics {
                data.set_series(metric, series);
            }
        }

        data.set_content(content);
        data
    }
}

fn parse_content_sheet(sheet: &Sheet) -> Vec<ContentData> {
    match locate_header(&sheet.rows, CONTENT_ALIASES, CONTENT_MARKERS) {
        Some((idx, map)) => content_rows(&sheet.rows[idx + 1..], &map),
        None => {
            warn!("sheet {:?} has no recognisable content header", sheet.name);
            Vec::new()
        }
    }
}

/// Daily series per metric from the metrics sheet. Only metrics whose column
/// resolved are present.
fn parse_metrics_sheet(sheet: &Sheet) -> BTreeMap<Metric, MetricSeries> {
    let Some((idx, map)) = locate_header(&sheet.rows, SHEET_METRICS_ALIASES, &[Field::Date])
    else {
        warn!("sheet {:?} has no recognisable date header", sheet.name);
        return BTreeMap::new();
    };

    let interaction_parts: Vec<Field> = [Field::Likes, Field::Comments, Field::Shares, Field::Clicks]
        .into_iter()
        .filter(|f| map.has(*f))
        .collect();

    let mut columns: Vec<(Metric, Vec<Field>)> = Vec::new();
    for (metric, field) in [
        (Metric::Impressions, Field::Impressions),
        (Metric::Reach, Field::Reach),
        (Metric::Followers, Field::Followers),
    ] {
        if map.has(field) {
            columns.push((metric, vec![field]));
        }
    }
    if map.has(Field::Interactions) {
        columns.push((Metric::Interactions, vec![Field::Interactions]));
    } else if !interaction_parts.is_empty() {
        columns.push((Metric::Interactions, interaction_parts));
    }

    let mut daily: BTreeMap<Metric, BTreeMap<NaiveDate, u64>> = BTreeMap::new();
    let mut skipped = 0usize;
    for row in &sheet.rows[idx + 1..] {
        let Some(date) = map.cell(row, Field::Date).and_then(normalize_date) else {
            skipped += 1;
            continue;
        };
        for (metric, fields) in &columns {
            let value = sum_cells(row, &map, fields);
            let day = daily.entry(*metric).or_default().entry(date).or_insert(0);
            *day = day.saturating_add(value);
        }
    }

    debug!(
        sheet = %sheet.name,
        rows_skipped = skipped,
        metrics = columns.len(),
        "parsed metrics sheet"
    );

    daily
        .into_iter()
        .map(|(metric, days)| (metric, MetricSeries::from_points(to_points(days))))
        .collect()
}

fn sum_cells(row: &[String], map: &ColumnMap, fields: &[Field]) -> u64 {
    saturating_total(fields.iter().filter_map(|f| map.cell(row, *f)).map(parse_count))
}

fn add_to_day(days: &mut BTreeMap<NaiveDate, u64>, date: NaiveDate, value: u64) {
    let day = days.entry(date).or_insert(0);
    *day = day.saturating_add(value);
}

/// Group dated content items by publish day. Trends use the percentage
/// definition on this path.
fn derive_from_content(content: &[ContentData]) -> Vec<(Metric, MetricSeries)> {
    let mut impressions: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    let mut reach: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    let mut interactions: BTreeMap<NaiveDate, u64> = BTreeMap::new();

    for item in content {
        let Some(date) = item.published_at else {
            continue;
        };
        add_to_day(&mut impressions, date, item.metrics.impressions);
        add_to_day(&mut reach, date, item.metrics.reach);
        add_to_day(&mut interactions, date, item.metrics.interactions());
    }

    [
        (Metric::Impressions, impressions),
        (Metric::Reach, reach),
        (Metric::Interactions, interactions),
    ]
    .into_iter()
    .map(|(metric, days)| {
        let points = to_points(days);
        let stats = calculate_stats_with(&points, TrendKind::Percentage);
        (metric, MetricSeries::with_stats(points, stats))
    })
    .collect()
}

fn to_points(days: BTreeMap<NaiveDate, u64>) -> Vec<DataPoint> {
    days.into_iter()
        .map(|(date, value)| DataPoint::new(date, value))
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
