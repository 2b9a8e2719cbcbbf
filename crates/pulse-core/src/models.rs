use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::PulseError;
use crate::stats::calculate_stats;

// ── Platform ──────────────────────────────────────────────────────────────────

/// A source of performance metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
    #[serde(rename = "linkedin")]
    LinkedIn,
    #[serde(rename = "tiktok")]
    TikTok,
    /// Website analytics fetched from the remote analytics API.
    Web,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Facebook,
        Platform::Instagram,
        Platform::LinkedIn,
        Platform::TikTok,
        Platform::Web,
    ];

    /// Canonical lowercase name, as used in manifests and on the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::LinkedIn => "linkedin",
            Platform::TikTok => "tiktok",
            Platform::Web => "web",
        }
    }

    /// Whether selecting this platform forces every other platform out of the
    /// selection. Web analytics do not mix with social reach numbers.
    pub fn is_exclusive(&self) -> bool {
        matches!(self, Platform::Web)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "facebook" | "fb" => Ok(Platform::Facebook),
            "instagram" | "ig" => Ok(Platform::Instagram),
            "linkedin" => Ok(Platform::LinkedIn),
            "tiktok" => Ok(Platform::TikTok),
            "web" | "ga" | "ga4" | "analytics" => Ok(Platform::Web),
            other => Err(PulseError::UnknownPlatform(other.to_string())),
        }
    }
}

/// Apply the selection-UI exclusivity rule to a requested platform list.
///
/// Duplicates are removed (first occurrence kept). When an exclusive platform
/// is present it is the only platform returned. The aggregator never calls
/// this; it aggregates whatever subset it is handed.
pub fn apply_exclusive_selection(requested: &[Platform]) -> Vec<Platform> {
    if let Some(exclusive) = requested.iter().find(|p| p.is_exclusive()) {
        return vec![*exclusive];
    }
    let mut selected: Vec<Platform> = Vec::with_capacity(requested.len());
    for platform in requested {
        if !selected.contains(platform) {
            selected.push(*platform);
        }
    }
    selected
}

// ── Metric ────────────────────────────────────────────────────────────────────

/// A per-platform tracked metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Impressions,
    Reach,
    Interactions,
    Followers,
    Visits,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Impressions,
        Metric::Reach,
        Metric::Interactions,
        Metric::Followers,
        Metric::Visits,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Impressions => "impressions",
            Metric::Reach => "reach",
            Metric::Interactions => "interactions",
            Metric::Followers => "followers",
            Metric::Visits => "visits",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "impressions" | "impresiones" | "visualizaciones" | "views" => Ok(Metric::Impressions),
            "reach" | "alcance" => Ok(Metric::Reach),
            "interactions" | "interacciones" | "engagement" => Ok(Metric::Interactions),
            "followers" | "seguidores" => Ok(Metric::Followers),
            "visits" | "visitas" | "sessions" => Ok(Metric::Visits),
            other => Err(PulseError::UnknownMetric(other.to_string())),
        }
    }
}

// ── DataPoint / DataStats ─────────────────────────────────────────────────────

/// One metric's measurement for one calendar day on one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Calendar day, serialised as `YYYY-MM-DD`.
    pub date: NaiveDate,
    pub value: u64,
}

impl DataPoint {
    pub fn new(date: NaiveDate, value: u64) -> Self {
        Self { date, value }
    }
}

/// Summary statistics derived from a [`DataPoint`] collection.
///
/// Always re-derivable from the series it summarises; see
/// [`crate::stats::calculate_stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataStats {
    pub total: u64,
    pub average: u64,
    pub max: u64,
    pub min: u64,
    /// Directional change; its unit depends on the producing call site.
    pub trend: i64,
}

/// A date-ordered series together with its statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub points: Vec<DataPoint>,
    pub stats: DataStats,
}

impl MetricSeries {
    /// Sort `points` by date and attach stats computed with the generic
    /// mean-difference trend.
    pub fn from_points(mut points: Vec<DataPoint>) -> Self {
        points.sort_by_key(|p| p.date);
        let stats = calculate_stats(&points);
        Self { points, stats }
    }

    /// Attach precomputed stats (used when a call site owns a different trend
    /// definition).
    pub fn with_stats(mut points: Vec<DataPoint>, stats: DataStats) -> Self {
        points.sort_by_key(|p| p.date);
        Self { points, stats }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points whose date falls inside `range`, in date order.
    pub fn points_within(&self, range: &DateRange) -> Vec<DataPoint> {
        self.points
            .iter()
            .filter(|p| range.contains(p.date))
            .copied()
            .collect()
    }
}

// ── Content ───────────────────────────────────────────────────────────────────

/// Per-item engagement counters. Missing source columns default to 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMetrics {
    #[serde(default)]
    pub impressions: u64,
    #[serde(default)]
    pub reach: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub shares: u64,
    #[serde(default)]
    pub saves: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_views: Option<u64>,
}

impl ContentMetrics {
    /// Likes, comments, shares and saves combined.
    pub fn interactions(&self) -> u64 {
        self.likes
            .saturating_add(self.comments)
            .saturating_add(self.shares)
            .saturating_add(self.saves)
    }
}

/// One published item (post, reel, video).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentData {
    /// Source-scoped identifier, stable within one parse.
    pub id: String,
    /// Free-form label such as `"Reel"` or `"Video"`.
    pub post_type: String,
    /// Truncated to [`crate::coercion::MAX_DESCRIPTION_CHARS`] characters.
    pub description: String,
    pub published_at: Option<NaiveDate>,
    /// Opaque link, possibly empty.
    pub permalink: String,
    pub metrics: ContentMetrics,
}

// ── Web analytics breakdowns ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownRow {
    pub label: String,
    pub value: u64,
}

/// Totals of one metric split by a provider dimension (channel, device, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionBreakdown {
    pub dimension: String,
    pub rows: Vec<BreakdownRow>,
}

// ── PlatformData ──────────────────────────────────────────────────────────────

/// Everything parsed for one platform.
///
/// A metric that could not be parsed is `None`, never a zero-filled series, so
/// callers can tell "no data" from "zero".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impressions: Option<MetricSeries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reach: Option<MetricSeries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactions: Option<MetricSeries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers: Option<MetricSeries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visits: Option<MetricSeries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentData>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub breakdowns: Vec<DimensionBreakdown>,
}

impl PlatformData {
    pub fn series(&self, metric: Metric) -> Option<&MetricSeries> {
        match metric {
            Metric::Impressions => self.impressions.as_ref(),
            Metric::Reach => self.reach.as_ref(),
            Metric::Interactions => self.interactions.as_ref(),
            Metric::Followers => self.followers.as_ref(),
            Metric::Visits => self.visits.as_ref(),
        }
    }

    /// Store `series` under `metric`. An empty series clears the field.
    pub fn set_series(&mut self, metric: Metric, series: MetricSeries) {
        let value = if series.is_empty() { None } else { Some(series) };
        match metric {
            Metric::Impressions => self.impressions = value,
            Metric::Reach => self.reach = value,
            Metric::Interactions => self.interactions = value,
            Metric::Followers => self.followers = value,
            Metric::Visits => self.visits = value,
        }
    }

    /// Store `content`; an empty list clears the field.
    pub fn set_content(&mut self, content: Vec<ContentData>) {
        self.content = if content.is_empty() {
            None
        } else {
            Some(content)
        };
    }

    /// Metrics that currently hold a series.
    pub fn available_metrics(&self) -> Vec<Metric> {
        Metric::ALL
            .into_iter()
            .filter(|m| self.series(*m).is_some())
            .collect()
    }

    pub fn has_data(&self) -> bool {
        !self.available_metrics().is_empty() || self.content.is_some()
    }
}

/// Parsed data keyed by platform.
pub type PlatformBundle = BTreeMap<Platform, PlatformData>;

// ── DateRange ─────────────────────────────────────────────────────────────────

/// An inclusive calendar-day range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PulseError> {
        if start > end {
            return Err(PulseError::InvalidDateRange(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse two `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, PulseError> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| PulseError::InvalidDateRange(format!("not a YYYY-MM-DD date: {s}")))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of days covered, both ends included.
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// The equal-length range ending the day before `start`.
    pub fn previous(&self) -> Self {
        let end = self.start - Duration::days(1);
        let start = end - Duration::days(self.len_days() - 1);
        Self { start, end }
    }

    /// `YYYY-MM-DD..YYYY-MM-DD`.
    pub fn label(&self) -> String {
        format!("{}..{}", self.start, self.end)
    }
}

// ── Aggregated report ─────────────────────────────────────────────────────────

/// The four metrics combined across platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombinedMetric {
    Visualizations,
    Reach,
    Interactions,
    Followers,
}

impl CombinedMetric {
    pub const ALL: [CombinedMetric; 4] = [
        CombinedMetric::Visualizations,
        CombinedMetric::Reach,
        CombinedMetric::Interactions,
        CombinedMetric::Followers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CombinedMetric::Visualizations => "visualizations",
            CombinedMetric::Reach => "reach",
            CombinedMetric::Interactions => "interactions",
            CombinedMetric::Followers => "followers",
        }
    }

    /// The per-platform metric feeding this combined metric.
    pub fn source_metric(&self) -> Metric {
        match self {
            CombinedMetric::Visualizations => Metric::Impressions,
            CombinedMetric::Reach => Metric::Reach,
            CombinedMetric::Interactions => Metric::Interactions,
            CombinedMetric::Followers => Metric::Followers,
        }
    }

    /// Display label used in alert descriptions.
    pub fn label(&self) -> &'static str {
        match self {
            CombinedMetric::Visualizations => "Visualizations",
            CombinedMetric::Reach => "Reach",
            CombinedMetric::Interactions => "Interactions",
            CombinedMetric::Followers => "Followers",
        }
    }
}

impl fmt::Display for CombinedMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combined totals across the selected platforms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedMetrics {
    pub visualizations: u64,
    pub reach: u64,
    pub interactions: u64,
    pub followers: u64,
}

impl CombinedMetrics {
    pub fn get(&self, metric: CombinedMetric) -> u64 {
        match metric {
            CombinedMetric::Visualizations => self.visualizations,
            CombinedMetric::Reach => self.reach,
            CombinedMetric::Interactions => self.interactions,
            CombinedMetric::Followers => self.followers,
        }
    }

    pub fn add(&mut self, metric: CombinedMetric, value: u64) {
        let slot = match metric {
            CombinedMetric::Visualizations => &mut self.visualizations,
            CombinedMetric::Reach => &mut self.reach,
            CombinedMetric::Interactions => &mut self.interactions,
            CombinedMetric::Followers => &mut self.followers,
        };
        *slot = slot.saturating_add(value);
    }
}

/// One calendar day of the unified series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedDay {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub metrics: CombinedMetrics,
}

impl CombinedDay {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            metrics: CombinedMetrics::default(),
        }
    }
}

/// Output of the cross-platform aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedReport {
    pub totals: CombinedMetrics,
    /// One entry per calendar date seen in any contributing series, sorted.
    pub daily: Vec<CombinedDay>,
    pub platforms: Vec<Platform>,
    pub date_range: String,
}

impl AggregatedReport {
    /// The unified series for one combined metric.
    pub fn series(&self, metric: CombinedMetric) -> Vec<DataPoint> {
        self.daily
            .iter()
            .map(|day| DataPoint::new(day.date, day.metrics.get(metric)))
            .collect()
    }

    /// Stats recomputed from the unified series.
    pub fn stats(&self, metric: CombinedMetric) -> DataStats {
        calculate_stats(&self.series(metric))
    }
}

// ── Alerts ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    /// A day well above its trailing baseline.
    Spike,
    /// A day well below its trailing baseline.
    Drop,
    /// Period-over-period increase.
    Growth,
    /// Period-over-period decrease.
    Decline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// A flagged observation about a metric.
///
/// `id` is deterministic for a given (metric, day or comparison window), so
/// alert batches can be merged and deduplicated by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAlert {
    pub id: String,
    pub metric: CombinedMetric,
    pub kind: AlertKind,
    pub severity: Severity,
    pub description: String,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
