//! Async runtime layer for SocialPulse.
//!
//! Runs ingestion manifests across blocking workers and talks to the remote
//! web-analytics API.

pub mod analytics;
pub mod error;
pub mod ingest;
pub mod report;

pub use analytics::{AnalyticsClient, AnalyticsConfig};
pub use error::{AnalyticsError, IngestError};
pub use ingest::{ingest_manifest, IngestOutcome, Manifest};
