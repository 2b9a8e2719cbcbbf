//! Manifest-driven ingestion of export files into a [`PlatformBundle`].
//!
//! Each source is read and parsed on a blocking worker; results are merged per
//! platform in manifest order once every worker has finished.

use std::path::{Path, PathBuf};

use pulse_core::error::PulseError;
use pulse_core::models::{
    ContentData, DataStats, Metric, MetricSeries, Platform, PlatformBundle, PlatformData,
};
use pulse_core::settings::PulseConfig;
use pulse_data::spreadsheet::validate_upload;
use pulse_data::{ContentCsvParser, MetricCsvParser, SpreadsheetParser};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{IngestError, Result};

const SOURCE_EXTENSIONS: &[&str] = &["csv", "xlsx", "xls"];

// ── Manifest ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    MetricCsv,
    ContentCsv,
    Spreadsheet,
}

/// One export file attributed to a platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub platform: Platform,
    pub kind: SourceKind,
    /// Required for [`SourceKind::MetricCsv`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<Metric>,
    pub path: PathBuf,
}

/// The list of sources for one report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub sources: Vec<SourceEntry>,
    /// Directory relative source paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Manifest {
    /// Read a JSON manifest; relative paths resolve against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let manifest_err = |source| IngestError::Manifest {
            path: path.to_path_buf(),
            source,
        };
        let content = std::fs::read_to_string(path).map_err(|source| {
            manifest_err(PulseError::FileRead {
                path: path.to_path_buf(),
                source,
            })
        })?;
        let mut manifest: Manifest =
            serde_json::from_str(&content).map_err(|e| manifest_err(PulseError::from(e)))?;
        manifest.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        manifest.validate()?;
        Ok(manifest)
    }

    /// Every metric export must name its metric.
    pub fn validate(&self) -> Result<()> {
        for entry in &self.sources {
            if entry.kind == SourceKind::MetricCsv && entry.metric.is_none() {
                return Err(IngestError::MissingMetric {
                    path: entry.path.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn resolve(&self, entry: &SourceEntry) -> PathBuf {
        if entry.path.is_absolute() {
            entry.path.clone()
        } else {
            self.base_dir.join(&entry.path)
        }
    }

    /// Distinct platforms named by the manifest, in first-seen order.
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms = Vec::new();
        for entry in &self.sources {
            if !platforms.contains(&entry.platform) {
                platforms.push(entry.platform);
            }
        }
        platforms
    }
}

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Find `.csv`/`.xlsx`/`.xls` files under `path` (or `path` itself), sorted.
pub fn discover_sources(path: &Path) -> Vec<PathBuf> {
    if !path.exists() {
        warn!("Path does not exist: {}", path.display());
        return Vec::new();
    }
    if path.is_file() {
        return vec![path.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && has_source_extension(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

fn has_source_extension(path: &Path) -> bool {
    extension(path).is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext.as_str()))
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// What one source contributed.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Series(Metric, MetricSeries),
    Content(Vec<ContentData>),
    Workbook(PlatformData),
}

/// A source that was skipped, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedSource {
    pub path: PathBuf,
    pub reason: String,
}

enum SourceOutcome {
    Loaded(Platform, Payload),
    Rejected(RejectedSource),
}

/// Read and parse one file. Validation and "no data" failures come back as
/// `Ok(Err(reason))`; a malformed workbook container is a hard error.
pub fn load_file(
    path: &Path,
    kind: SourceKind,
    metric: Option<Metric>,
    max_spreadsheet_bytes: u64,
) -> std::result::Result<std::result::Result<Payload, String>, PulseError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if kind == SourceKind::Spreadsheet {
        let size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) => return Ok(Err(format!("cannot read file: {e}"))),
        };
        // Extension and size are checked before the file is read.
        if let Err(e) = validate_upload(&name, size, max_spreadsheet_bytes) {
            return Ok(Err(e.to_string()));
        }
    }

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => return Ok(Err(format!("cannot read file: {e}"))),
    };

    match kind {
        SourceKind::Spreadsheet => {
            let parser = SpreadsheetParser::new(max_spreadsheet_bytes);
            match parser.parse_bytes(&name, &bytes) {
                Ok(data) if data.has_data() => Ok(Ok(Payload::Workbook(data))),
                Ok(_) => Ok(Err("workbook has no usable data".to_string())),
                Err(e @ (PulseError::UnsupportedFile { .. } | PulseError::FileTooLarge { .. })) => {
                    Ok(Err(e.to_string()))
                }
                Err(e) => Err(e),
            }
        }
        SourceKind::MetricCsv => {
            let text = String::from_utf8_lossy(&bytes);
            let parser = MetricCsvParser::new();
            if !parser.has_valid_data(&text) {
                return Ok(Err("file has no data".to_string()));
            }
            let metric = metric.unwrap_or(Metric::Reach);
            Ok(Ok(Payload::Series(metric, parser.parse(&text, metric))))
        }
        SourceKind::ContentCsv => {
            let text = String::from_utf8_lossy(&bytes);
            let parser = ContentCsvParser::new();
            if !parser.has_valid_data(&text) {
                return Ok(Err("file has no data".to_string()));
            }
            Ok(Ok(Payload::Content(parser.parse(&text))))
        }
    }
}

/// Pick a source kind from the extension and, for CSV, the header.
pub fn detect_kind(path: &Path) -> Option<SourceKind> {
    match extension(path)?.as_str() {
        "xlsx" | "xls" => Some(SourceKind::Spreadsheet),
        "csv" => {
            let bytes = std::fs::read(path).ok()?;
            let text = String::from_utf8_lossy(&bytes);
            if ContentCsvParser::new().looks_like_content(&text) {
                Some(SourceKind::ContentCsv)
            } else {
                Some(SourceKind::MetricCsv)
            }
        }
        _ => None,
    }
}

// ── Orchestration ─────────────────────────────────────────────────────────────

/// Result of ingesting a manifest.
#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    pub bundle: PlatformBundle,
    pub rejected: Vec<RejectedSource>,
    pub loaded: usize,
}

/// Parse every manifest source concurrently and merge per platform.
///
/// Later sources for the same metric replace earlier ones.
pub async fn ingest_manifest(manifest: &Manifest, config: &PulseConfig) -> Result<IngestOutcome> {
    manifest.validate()?;

    let handles: Vec<_> = manifest
        .sources
        .iter()
        .map(|entry| {
            let path = manifest.resolve(entry);
            let entry = entry.clone();
            let max_bytes = config.max_spreadsheet_bytes;
            tokio::task::spawn_blocking(move || -> std::result::Result<SourceOutcome, PulseError> {
                match load_file(&path, entry.kind, entry.metric, max_bytes)? {
                    Ok(payload) => Ok(SourceOutcome::Loaded(entry.platform, payload)),
                    Err(reason) => Ok(SourceOutcome::Rejected(RejectedSource { path, reason })),
                }
            })
        })
        .collect();

    let mut outcome = IngestOutcome::default();
    for handle in handles {
        match handle.await?? {
            SourceOutcome::Loaded(platform, payload) => {
                merge_payload(outcome.bundle.entry(platform).or_default(), platform, payload);
                outcome.loaded += 1;
            }
            SourceOutcome::Rejected(rejected) => {
                warn!("rejected {}: {}", rejected.path.display(), rejected.reason);
                outcome.rejected.push(rejected);
            }
        }
    }

    info!(
        loaded = outcome.loaded,
        rejected = outcome.rejected.len(),
        platforms = outcome.bundle.len(),
        "ingest complete"
    );
    Ok(outcome)
}

fn merge_payload(data: &mut PlatformData, platform: Platform, payload: Payload) {
    match payload {
        Payload::Series(metric, series) => replace_series(data, platform, metric, series),
        Payload::Content(content) => replace_content(data, platform, content),
        Payload::Workbook(parsed) => {
            for metric in parsed.available_metrics() {
                if let Some(series) = parsed.series(metric) {
                    replace_series(data, platform, metric, series.clone());
                }
            }
            if let Some(content) = parsed.content {
                replace_content(data, platform, content);
            }
            data.breakdowns.extend(parsed.breakdowns);
        }
    }
}

fn replace_series(data: &mut PlatformData, platform: Platform, metric: Metric, series: MetricSeries) {
    if data.series(metric).is_some() {
        debug!("{}: replacing earlier {} series", platform, metric);
    }
    data.set_series(metric, series);
}

fn replace_content(data: &mut PlatformData, platform: Platform, content: Vec<ContentData>) {
    if data.content.is_some() {
        debug!("{}: replacing earlier content list", platform);
    }
    data.set_content(content);
}

// ── Inspection ────────────────────────────────────────────────────────────────

/// What was recognised in one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSummary {
    pub path: PathBuf,
    pub kind: Option<SourceKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<MetricSummary>,
    pub content_items: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub metric: Metric,
    pub points: usize,
    pub stats: DataStats,
}

/// Detect, load and summarise one file. `metric` labels single-metric CSVs.
pub fn inspect_file(
    path: &Path,
    metric: Metric,
    max_spreadsheet_bytes: u64,
) -> std::result::Result<FileSummary, PulseError> {
    let mut summary = FileSummary {
        path: path.to_path_buf(),
        kind: detect_kind(path),
        metrics: Vec::new(),
        content_items: 0,
        rejected: None,
    };
    let Some(kind) = summary.kind else {
        summary.rejected = Some("unrecognised file type".to_string());
        return Ok(summary);
    };

    match load_file(path, kind, Some(metric), max_spreadsheet_bytes)? {
        Ok(payload) => {
            let mut data = PlatformData::default();
            merge_payload(&mut data, Platform::Web, payload);
            summary.metrics = data
                .available_metrics()
                .into_iter()
                .filter_map(|m| {
                    data.series(m).map(|s| MetricSummary {
                        metric: m,
                        points: s.points.len(),
                        stats: s.stats,
                    })
                })
                .collect();
            summary.content_items = data.content.as_ref().map_or(0, Vec::len);
        }
        Err(reason) => summary.rejected = Some(reason),
    }
    Ok(summary)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
