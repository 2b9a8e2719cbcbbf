//! Ingestion and analytics layer for SocialPulse.
//!
//! Turns raw vendor exports (delimited metric and content files, multi-sheet
//! workbooks) into the canonical model, merges platforms into one daily
//! series, and flags anomalies in the result.

pub mod aggregator;
pub mod anomaly;
pub mod content;
pub mod headers;
pub mod metric_csv;
pub mod sanitize;
pub mod spreadsheet;

pub use aggregator::CrossPlatformAggregator;
pub use content::ContentCsvParser;
pub use metric_csv::MetricCsvParser;
pub use spreadsheet::{SpreadsheetParser, Workbook};

pub use pulse_core as core;
