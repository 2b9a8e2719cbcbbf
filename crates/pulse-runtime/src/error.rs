use std::path::PathBuf;

use pulse_core::error::PulseError;
use thiserror::Error;

/// Errors returned by the remote analytics adapter.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// No usable credentials: missing refresh token, revoked grant, or a
    /// second authorization failure after one refresh.
    #[error("analytics account not connected: {0}")]
    NotConnected(String),

    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("analytics API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response body did not match the expected shape.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The adapter was configured with an unusable URL.
    #[error("invalid analytics configuration: {0}")]
    InvalidConfig(String),
}

impl AnalyticsError {
    /// True when re-authenticating could fix the failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AnalyticsError::NotConnected(_))
    }
}

/// Errors surfaced by the ingestion orchestrator.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: PulseError,
    },

    #[error("manifest entry for {path} is a metric export but names no metric")]
    MissingMetric { path: PathBuf },

    #[error(transparent)]
    Parse(#[from] PulseError),

    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    #[error("ingest task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, IngestError>;
