//! Telemetry for synthesis runs
//!
//! - `metrics` - Prometheus counters for one scan, snapshotted into the contract

pub mod metrics;

pub use metrics::{ScanMetrics, ScanTimer};

use thiserror::Error;

/// Telemetry errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Metrics error: {0}")]
    MetricsError(#[from] prometheus::Error),

    #[error("Metrics encoding error: {0}")]
    EncodingError(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

impl From<TelemetryError> for crate::error::RepostyleError {
    fn from(err: TelemetryError) -> Self {
        crate::error::RepostyleError::InternalError(err.to_string())
    }
}
