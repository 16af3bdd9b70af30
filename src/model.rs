//! Core data types for the flood alert analytics service.
//!
//! This module defines the shared domain model imported by all other modules:
//! stations, readings, the alert status enum and the collaborator error type.
//! It contains no I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Station types
// ---------------------------------------------------------------------------

/// WGS84 position of a monitoring station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

/// Warning and danger water levels for a station, in meters.
///
/// `warning < danger` by convention. Nothing enforces it; classification
/// still behaves deterministically when the pair is inverted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub warning: f64,
    pub danger: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning: 5.0,
            danger: 7.0,
        }
    }
}

/// A fixed monitoring point. Identity is immutable; `thresholds` and
/// `last_updated` are owned by the station registry and may change at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub station_id: String,
    pub name: String,
    pub location: Location,
    pub thresholds: Thresholds,
    pub last_updated: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// Alert status, in ascending order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Normal,
    Warning,
    Danger,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Normal => "NORMAL",
            AlertStatus::Warning => "WARNING",
            AlertStatus::Danger => "DANGER",
        }
    }

    /// Parses the stored representation. Unknown strings yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NORMAL" => Some(AlertStatus::Normal),
            "WARNING" => Some(AlertStatus::Warning),
            "DANGER" => Some(AlertStatus::Danger),
            _ => None,
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped sensor sample.
///
/// Immutable once stored. `status` was classified against the station's
/// thresholds at insert time and is never recomputed, so it can disagree
/// with the station's current thresholds after an operator edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub station_id: String,
    pub water_level: f64,
    pub battery_level: u8,
    pub status: AlertStatus,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failures reported by the reading store or station registry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A query was issued but failed or returned malformed rows.
    #[error("query failed: {0}")]
    Query(String),
    /// No station is registered under this id.
    #[error("station not found: {0}")]
    StationNotFound(String),
    /// A reading was rejected before being stored.
    #[error("invalid reading: {0}")]
    InvalidReading(String),
    /// A station is already registered under this id.
    #[error("station already exists: {0}")]
    DuplicateStation(String),
    /// A new station was rejected before being registered.
    #[error("invalid station: {0}")]
    InvalidStation(String),
}

// ---------------------------------------------------------------------------
// Presentation rounding
// ---------------------------------------------------------------------------

/// Rounds half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn serialize_rounded<S: Serializer>(value: f64, places: i32, s: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        s.serialize_f64(round_to(value, places))
    } else {
        s.serialize_none()
    }
}

pub(crate) fn round_2<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
    serialize_rounded(*value, 2, s)
}

pub(crate) fn round_3<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
    serialize_rounded(*value, 3, s)
}

pub(crate) fn round_opt_1<S: Serializer>(value: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => serialize_rounded(*v, 1, s),
        None => s.serialize_none(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_status_orders_by_severity() {
        assert!(AlertStatus::Normal < AlertStatus::Warning);
        assert!(AlertStatus::Warning < AlertStatus::Danger);
    }

    #[test]
    fn test_alert_status_round_trips_through_stored_form() {
        for status in [AlertStatus::Normal, AlertStatus::Warning, AlertStatus::Danger] {
            assert_eq!(AlertStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AlertStatus::parse("normal"), None);
    }

    #[test]
    fn test_alert_status_serializes_uppercase() {
        let json = serde_json::to_string(&AlertStatus::Warning).unwrap();
        assert_eq!(json, "\"WARNING\"");
    }

    #[test]
    fn test_reading_serializes_camel_case() {
        let reading = Reading {
            station_id: "kelani-01".to_string(),
            water_level: 4.2,
            battery_level: 88,
            status: AlertStatus::Normal,
            timestamp: "2024-05-01T12:00:00Z".parse().unwrap(),
        };
        let value = serde_json::to_value(&reading).unwrap();
        assert_eq!(value["stationId"], "kelani-01");
        assert_eq!(value["waterLevel"], 4.2);
        assert_eq!(value["batteryLevel"], 88);
        assert_eq!(value["status"], "NORMAL");
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(5.0449, 2), 5.04);
        assert_eq!(round_to(-0.2346, 3), -0.235);
        assert_eq!(round_to(2.25, 1), 2.3);
    }

    #[test]
    fn test_default_thresholds_match_registry_defaults() {
        let t = Thresholds::default();
        assert_eq!(t.warning, 5.0);
        assert_eq!(t.danger, 7.0);
    }
}
