/// Configuration loaders - parse analytics.toml and stations.toml
///
/// Keeps window sizes, history gates and the station seed out of code so
/// they can be tuned without recompiling the service.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::{Location, Station, Thresholds};

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid setting in {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

// ---------------------------------------------------------------------------
// Analytics tuning
// ---------------------------------------------------------------------------

/// Window sizes and gates for the analytics reports.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Readings fetched per station for predictions and risk forecast.
    pub prediction_window: usize,
    /// Readings fetched per station for the trends report.
    pub trend_window: usize,
    /// Readings fetched per station for correlation.
    pub correlation_window: usize,
    /// Stations with fewer readings than this are left out of trend,
    /// prediction and risk reports.
    pub min_history: usize,
    /// Trailing window for the statistics report.
    pub statistics_window_hours: i64,
    /// Threads used for per-station fetches.
    pub worker_threads: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            prediction_window: 20,
            trend_window: 10,
            correlation_window: 20,
            min_history: 5,
            statistics_window_hours: 24,
            worker_threads: 4,
        }
    }
}

impl AnalyticsConfig {
    /// The statistics window as a duration. `None` unless the hour count is
    /// positive and small enough to subtract from the current time.
    pub fn statistics_window(&self) -> Option<Duration> {
        if self.statistics_window_hours <= 0 {
            return None;
        }
        Duration::try_hours(self.statistics_window_hours)
            .filter(|window| Utc::now().checked_sub_signed(*window).is_some())
    }
}

/// Loads analytics tuning. A missing file yields the defaults.
pub fn load_analytics_config(path: &Path) -> Result<AnalyticsConfig, ConfigError> {
    if !path.exists() {
        return Ok(AnalyticsConfig::default());
    }
    let contents = read(path)?;
    let config: AnalyticsConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    if config.statistics_window().is_none() {
        return Err(ConfigError::Invalid {
            path: path.to_path_buf(),
            reason: format!(
                "statistics_window_hours must be a positive number of hours, got {}",
                config.statistics_window_hours
            ),
        });
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// Station seed
// ---------------------------------------------------------------------------

/// One `[[station]]` entry in stations.toml.
#[derive(Debug, Clone, Deserialize)]
pub struct StationConfig {
    pub station_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_warning")]
    pub warning: f64,
    #[serde(default = "default_danger")]
    pub danger: f64,
}

fn default_warning() -> f64 {
    Thresholds::default().warning
}

fn default_danger() -> f64 {
    Thresholds::default().danger
}

#[derive(Debug, Deserialize)]
struct StationFile {
    station: Vec<StationConfig>,
}

impl StationConfig {
    pub fn into_station(self, last_updated: DateTime<Utc>) -> Station {
        Station {
            station_id: self.station_id,
            name: self.name,
            location: Location {
                lat: self.latitude,
                lng: self.longitude,
            },
            thresholds: Thresholds {
                warning: self.warning,
                danger: self.danger,
            },
            last_updated,
        }
    }
}

/// Parses a station seed from TOML text.
pub fn parse_station_config(contents: &str) -> Result<Vec<StationConfig>, toml::de::Error> {
    toml::from_str::<StationFile>(contents).map(|f| f.station)
}

/// Loads the station seed file.
pub fn load_station_config(path: &Path) -> Result<Vec<StationConfig>, ConfigError> {
    let contents = read(path)?;
    parse_station_config(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}
