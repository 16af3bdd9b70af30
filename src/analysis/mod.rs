//! Situational analytics over recent station readings.
//!
//! Submodules:
//! - `trend`       — time-weighted rate of change and rising/falling/stable.
//! - `forecast`    — six-hour linear projection with decaying confidence.
//! - `correlation` — pairwise Pearson correlation of recent level series.
//! - `risk`        — time-to-threshold estimates and risk tiers.
//! - `statistics`  — trailing-window fleet statistics.
//! - `reports`     — `AnalyticsService`, which fetches per-station windows and
//!   assembles the serializable reports.
//!
//! Everything except `reports` is pure: given the fetched windows, the same
//! inputs always give the same outputs.

pub mod correlation;
pub mod forecast;
pub mod reports;
pub mod risk;
pub mod statistics;
pub mod trend;

use crate::model::StoreError;

/// Failure of a whole report. Reports are never returned partially filled.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A fan-out job ended without reporting a result, e.g. it panicked.
    #[error("worker for station {0} did not report a result")]
    WorkerFailed(String),
    /// The statistics window cannot be subtracted from the report time.
    #[error("statistics window of {0} hours is out of range")]
    InvalidWindow(i64),
}
