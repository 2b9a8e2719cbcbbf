//! Canonical data model and shared building blocks for SocialPulse.
//!
//! Every parser, the aggregator and the anomaly engine converge on the shapes
//! in [`models`]; [`coercion`] and [`stats`] are the pure helpers they share.

pub mod coercion;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod stats;

pub use error::{PulseError, Result};
