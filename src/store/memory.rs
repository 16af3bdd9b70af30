//! In-memory station registry and reading store.
//!
//! Backs the integration tests and `--in-memory` mode. Readings are kept
//! per station in insertion order and sorted on read.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::model::{Reading, Station, StoreError, Thresholds};
use crate::store::{ReadingStore, StationRegistry};

#[derive(Default)]
pub struct MemoryStore {
    /// Registry order is insertion order.
    stations: RwLock<Vec<Station>>,
    readings: RwLock<HashMap<String, Vec<Reading>>>,
}

fn poisoned(what: &str) -> StoreError {
    StoreError::Unavailable(format!("{} lock poisoned", what))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stations(stations: Vec<Station>) -> Self {
        Self {
            stations: RwLock::new(stations),
            readings: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a station, replacing any existing one with the same id.
    pub fn upsert_station(&self, station: Station) -> Result<(), StoreError> {
        let mut stations = self.stations_mut()?;
        match stations.iter_mut().find(|s| s.station_id == station.station_id) {
            Some(existing) => *existing = station,
            None => stations.push(station),
        }
        Ok(())
    }

    fn stations(&self) -> Result<RwLockReadGuard<'_, Vec<Station>>, StoreError> {
        self.stations.read().map_err(|_| poisoned("station registry"))
    }

    fn stations_mut(&self) -> Result<RwLockWriteGuard<'_, Vec<Station>>, StoreError> {
        self.stations.write().map_err(|_| poisoned("station registry"))
    }

    fn readings(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Vec<Reading>>>, StoreError> {
        self.readings.read().map_err(|_| poisoned("readings"))
    }
}

impl ReadingStore for MemoryStore {
    fn fetch_recent(&self, station_id: &str, limit: usize) -> Result<Vec<Reading>, StoreError> {
        let readings = self.readings()?;
        let mut recent: Vec<Reading> = readings.get(station_id).cloned().unwrap_or_default();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(limit);
        Ok(recent)
    }

    fn fetch_in_window(&self, station_id: &str, since: DateTime<Utc>) -> Result<Vec<Reading>, StoreError> {
        let readings = self.readings()?;
        Ok(readings
            .get(station_id)
            .map(|rs| rs.iter().filter(|r| r.timestamp >= since).cloned().collect())
            .unwrap_or_default())
    }

    fn insert_reading(&self, reading: &Reading) -> Result<(), StoreError> {
        let mut readings = self.readings.write().map_err(|_| poisoned("readings"))?;
        readings
            .entry(reading.station_id.clone())
            .or_default()
            .push(reading.clone());
        Ok(())
    }
}

impl StationRegistry for MemoryStore {
    fn list_stations(&self) -> Result<Vec<Station>, StoreError> {
        Ok(self.stations()?.clone())
    }

    fn find_station(&self, station_id: &str) -> Result<Option<Station>, StoreError> {
        Ok(self.stations()?.iter().find(|s| s.station_id == station_id).cloned())
    }

    fn add_station(&self, station: Station) -> Result<Station, StoreError> {
        let mut stations = self.stations_mut()?;
        if stations.iter().any(|s| s.station_id == station.station_id) {
            return Err(StoreError::DuplicateStation(station.station_id));
        }
        stations.push(station.clone());
        Ok(station)
    }

    fn update_thresholds(&self, station_id: &str, thresholds: Thresholds) -> Result<Station, StoreError> {
        let mut stations = self.stations_mut()?;
        let station = stations
            .iter_mut()
            .find(|s| s.station_id == station_id)
            .ok_or_else(|| StoreError::StationNotFound(station_id.to_string()))?;
        station.thresholds = thresholds;
        Ok(station.clone())
    }

    fn touch(&self, station_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut stations = self.stations_mut()?;
        let station = stations
            .iter_mut()
            .find(|s| s.station_id == station_id)
            .ok_or_else(|| StoreError::StationNotFound(station_id.to_string()))?;
        station.last_updated = at;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
