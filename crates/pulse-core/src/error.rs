use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the ingestion and analytics crates.
///
/// "No data found" is never an error: parsers return empty collections for
/// that case. Only genuinely exceptional conditions end up here.
#[derive(Error, Debug)]
pub enum PulseError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A file was rejected before parsing (wrong extension, empty export, ...).
    #[error("Unsupported file {name}: {reason}")]
    UnsupportedFile { name: String, reason: String },

    /// A file exceeds the configured size bound.
    #[error("File {name} is {size} bytes, larger than the {max} byte limit")]
    FileTooLarge { name: String, size: u64, max: u64 },

    /// The spreadsheet container itself is malformed.
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// A caller-supplied date range is not usable.
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    /// A platform name is not one of the recognised platforms.
    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    /// A metric name is not one of the tracked metrics.
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the pulse crates.
pub type Result<T> = std::result::Result<T, PulseError>;
