/// Station registry seeding.
///
/// Turns the `stations.toml` seed into `Station`s and checks it before it is
/// loaded into a registry: duplicate ids are rejected, inverted thresholds
/// are only logged (warning < danger is a convention, not a rule).

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

use crate::config::{self, ConfigError, StationConfig};
use crate::model::{Station, StoreError};
use crate::store::memory::MemoryStore;
use crate::store::pg::PgStore;

/// Default seed file, relative to the working directory.
pub const DEFAULT_STATIONS_PATH: &str = "stations.toml";

/// Seed problems that make a registry unusable.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("duplicate station id '{0}' in station seed")]
    DuplicateStation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Converts seed entries into stations, rejecting duplicate ids.
pub fn build_stations(entries: Vec<StationConfig>, now: DateTime<Utc>) -> Result<Vec<Station>, SeedError> {
    let mut seen = HashSet::new();
    let mut stations = Vec::with_capacity(entries.len());

    for entry in entries {
        if !seen.insert(entry.station_id.clone()) {
            return Err(SeedError::DuplicateStation(entry.station_id));
        }
        if entry.warning >= entry.danger {
            warn!(
                station_id = %entry.station_id,
                warning = entry.warning,
                danger = entry.danger,
                "warning threshold is not below danger threshold"
            );
        }
        stations.push(entry.into_station(now));
    }

    Ok(stations)
}

/// Loads and checks the station seed file.
pub fn load_stations(path: &Path, now: DateTime<Utc>) -> Result<Vec<Station>, SeedError> {
    build_stations(config::load_station_config(path)?, now)
}

/// Builds an in-memory registry from the seed file.
pub fn seed_memory_store(path: &Path) -> Result<MemoryStore, SeedError> {
    Ok(MemoryStore::with_stations(load_stations(path, Utc::now())?))
}

/// Upserts the seed into postgres. Returns the number of stations written.
pub fn seed_pg_store(store: &PgStore, path: &Path) -> Result<usize, SeedError> {
    let stations = load_stations(path, Utc::now())?;
    for station in &stations {
        store.upsert_station(station)?;
    }
    Ok(stations.len())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StationRegistry;

    fn entry(id: &str, warning: f64, danger: f64) -> StationConfig {
        StationConfig {
            station_id: id.to_string(),
            name: format!("{} gauge", id),
            latitude: 6.9,
            longitude: 80.0,
            warning,
            danger,
        }
    }

    #[test]
    fn test_repository_seed_loads() {
        let stations = load_stations(Path::new(DEFAULT_STATIONS_PATH), Utc::now())
            .expect("stations.toml should load from the crate root");
        assert_eq!(stations.len(), 10);

        let kelani = stations
            .iter()
            .find(|s| s.station_id == "kelani-01")
            .expect("kelani-01 should be in the seed");
        assert_eq!(kelani.thresholds.warning, 5.0);
        assert_eq!(kelani.thresholds.danger, 7.0);
    }

    #[test]
    fn test_repository_seed_thresholds_ascending() {
        let stations = load_stations(Path::new(DEFAULT_STATIONS_PATH), Utc::now()).unwrap();
        for station in stations {
            assert!(
                station.thresholds.warning < station.thresholds.danger,
                "warning must be below danger for '{}'",
                station.name
            );
            assert!(station.location.lat >= -90.0 && station.location.lat <= 90.0);
            assert!(station.location.lng >= -180.0 && station.location.lng <= 180.0);
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = build_stations(vec![entry("a", 1.0, 2.0), entry("a", 3.0, 4.0)], Utc::now()).unwrap_err();
        assert!(matches!(err, SeedError::DuplicateStation(id) if id == "a"));
    }

    #[test]
    fn test_inverted_thresholds_are_kept() {
        let stations = build_stations(vec![entry("inv", 8.0, 6.0)], Utc::now()).unwrap();
        assert_eq!(stations[0].thresholds.warning, 8.0);
    }

    #[test]
    fn test_seed_memory_store_registers_in_file_order() {
        let store = seed_memory_store(Path::new(DEFAULT_STATIONS_PATH)).unwrap();
        let stations = store.list_stations().unwrap();
        assert_eq!(stations.first().map(|s| s.station_id.as_str()), Some("kelani-01"));
        assert_eq!(stations.last().map(|s| s.station_id.as_str()), Some("deduru-01"));
    }
}
