//! Station registry and reading store interfaces.
//!
//! The analytics core only reads through these traits, so it runs the same
//! against postgres (`pg::PgStore`) and the in-memory store used by
//! tests and the `--in-memory` service mode (`memory::MemoryStore`).
//!
//! The write path lives here too: `record_reading` freezes a reading's status
//! against the station's thresholds at insert time.

pub mod memory;
pub mod pg;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::alert::thresholds::classify_level;
use crate::model::{Location, Reading, Station, StoreError, Thresholds};

/// Time-ordered access to stored readings.
pub trait ReadingStore: Send + Sync {
    /// The `limit` most recent readings for a station, newest first.
    fn fetch_recent(&self, station_id: &str, limit: usize) -> Result<Vec<Reading>, StoreError>;

    /// Readings at or after `since`. Order is unspecified.
    fn fetch_in_window(&self, station_id: &str, since: DateTime<Utc>) -> Result<Vec<Reading>, StoreError>;

    /// Appends a reading. Stored readings are never modified.
    fn insert_reading(&self, reading: &Reading) -> Result<(), StoreError>;
}

/// The set of monitored stations and their current thresholds.
pub trait StationRegistry: Send + Sync {
    fn list_stations(&self) -> Result<Vec<Station>, StoreError>;

    fn find_station(&self, station_id: &str) -> Result<Option<Station>, StoreError>;

    /// Registers a new station. Fails with `DuplicateStation` if the id is taken.
    fn add_station(&self, station: Station) -> Result<Station, StoreError>;

    /// Replaces a station's thresholds and returns the updated station.
    fn update_thresholds(&self, station_id: &str, thresholds: Thresholds) -> Result<Station, StoreError>;

    /// Sets a station's `last_updated` timestamp.
    fn touch(&self, station_id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Current (not historical) thresholds for a station.
    fn get_thresholds(&self, station_id: &str) -> Result<Thresholds, StoreError> {
        self.find_station(station_id)?
            .map(|s| s.thresholds)
            .ok_or_else(|| StoreError::StationNotFound(station_id.to_string()))
    }
}

/// Validates, classifies and stores a new sensor reading.
///
/// The status is classified against the station's thresholds as they are
/// now and stored with the reading; later threshold edits do not touch it.
pub fn record_reading(
    registry: &dyn StationRegistry,
    store: &dyn ReadingStore,
    station_id: &str,
    water_level: f64,
    battery_level: i64,
    timestamp: DateTime<Utc>,
) -> Result<Reading, StoreError> {
    if !water_level.is_finite() {
        return Err(StoreError::InvalidReading(format!(
            "water level must be a finite number, got {}",
            water_level
        )));
    }
    let battery_level = u8::try_from(battery_level)
        .ok()
        .filter(|b| *b <= 100)
        .ok_or_else(|| {
            StoreError::InvalidReading(format!(
                "battery level must be within 0..=100, got {}",
                battery_level
            ))
        })?;

    let thresholds = registry.get_thresholds(station_id)?;

    let reading = Reading {
        station_id: station_id.to_string(),
        water_level,
        battery_level,
        status: classify_level(water_level, &thresholds),
        timestamp,
    };

    store.insert_reading(&reading)?;
    registry.touch(station_id, timestamp)?;

    Ok(reading)
}

/// Validates and registers a new station.
///
/// Ids and names must be non-empty, coordinates in range and thresholds
/// finite. Inverted thresholds are accepted and logged.
pub fn register_station(registry: &dyn StationRegistry, station: Station) -> Result<Station, StoreError> {
    if station.station_id.trim().is_empty() {
        return Err(StoreError::InvalidStation("station id must not be empty".to_string()));
    }
    if station.name.trim().is_empty() {
        return Err(StoreError::InvalidStation("station name must not be empty".to_string()));
    }
    let Location { lat, lng } = station.location;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(StoreError::InvalidStation(format!(
            "location ({}, {}) is out of range",
            lat, lng
        )));
    }
    let Thresholds { warning, danger } = station.thresholds;
    if !warning.is_finite() || !danger.is_finite() {
        return Err(StoreError::InvalidStation("thresholds must be finite numbers".to_string()));
    }
    if warning >= danger {
        warn!(
            station_id = %station.station_id,
            warning,
            danger,
            "registering station with warning not below danger"
        );
    }

    registry.add_station(station)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
