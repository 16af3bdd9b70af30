//! PostgreSQL-backed registry and reading store.
//!
//! Tables live in the `flood_alert` schema (see `sql/001_initial_schema.sql`).
//! Levels and thresholds are NUMERIC columns, read through `rust_decimal`.
//!
//! A single connection is shared behind a mutex, so concurrent report fan-out
//! serializes on it.

use chrono::{DateTime, Utc};
use postgres::{Client, Row};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use std::sync::{Mutex, MutexGuard};

use crate::model::{AlertStatus, Location, Reading, Station, StoreError, Thresholds};
use crate::store::{ReadingStore, StationRegistry};

const STATION_COLUMNS: &str =
    "station_id, name, latitude, longitude, warning_threshold, danger_threshold, last_updated";

const READING_COLUMNS: &str = "station_id, water_level, battery_level, status, reading_time";

pub struct PgStore {
    client: Mutex<Client>,
}

fn query_error(e: postgres::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

fn decimal_to_f64(value: Decimal, column: &str) -> Result<f64, StoreError> {
    value
        .to_f64()
        .ok_or_else(|| StoreError::Query(format!("{} value {} is not representable as f64", column, value)))
}

fn f64_to_decimal(value: f64, column: &str) -> Result<Decimal, StoreError> {
    Decimal::from_f64(value)
        .ok_or_else(|| StoreError::InvalidReading(format!("{} value {} cannot be stored", column, value)))
}

fn station_from_row(row: &Row) -> Result<Station, StoreError> {
    Ok(Station {
        station_id: row.get(0),
        name: row.get(1),
        location: Location {
            lat: row.get(2),
            lng: row.get(3),
        },
        thresholds: Thresholds {
            warning: decimal_to_f64(row.get(4), "warning_threshold")?,
            danger: decimal_to_f64(row.get(5), "danger_threshold")?,
        },
        last_updated: row.get(6),
    })
}

fn reading_from_row(row: &Row) -> Result<Reading, StoreError> {
    let status: String = row.get(3);
    let battery: i16 = row.get(2);
    Ok(Reading {
        station_id: row.get(0),
        water_level: decimal_to_f64(row.get(1), "water_level")?,
        battery_level: u8::try_from(battery)
            .map_err(|_| StoreError::Query(format!("battery_level {} out of range", battery)))?,
        status: AlertStatus::parse(&status)
            .ok_or_else(|| StoreError::Query(format!("unknown reading status '{}'", status)))?,
        timestamp: row.get(4),
    })
}

impl PgStore {
    pub fn new(client: Client) -> Self {
        Self {
            client: Mutex::new(client),
        }
    }

    /// Connects via `DATABASE_URL` and verifies the schema.
    pub fn connect() -> Result<Self, crate::db::DbConfigError> {
        crate::db::connect_and_verify().map(Self::new)
    }

    fn client(&self) -> Result<MutexGuard<'_, Client>, StoreError> {
        self.client
            .lock()
            .map_err(|_| StoreError::Unavailable("database connection lock poisoned".to_string()))
    }

    /// Inserts or replaces a station row.
    pub fn upsert_station(&self, station: &Station) -> Result<(), StoreError> {
        let warning = f64_to_decimal(station.thresholds.warning, "warning_threshold")?;
        let danger = f64_to_decimal(station.thresholds.danger, "danger_threshold")?;
        self.client()?
            .execute(
                "INSERT INTO flood_alert.stations
                 (station_id, name, latitude, longitude, warning_threshold, danger_threshold, last_updated)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (station_id) DO UPDATE SET
                    name = EXCLUDED.name,
                    latitude = EXCLUDED.latitude,
                    longitude = EXCLUDED.longitude,
                    warning_threshold = EXCLUDED.warning_threshold,
                    danger_threshold = EXCLUDED.danger_threshold",
                &[
                    &station.station_id,
                    &station.name,
                    &station.location.lat,
                    &station.location.lng,
                    &warning,
                    &danger,
                    &station.last_updated,
                ],
            )
            .map_err(query_error)?;
        Ok(())
    }
}

impl ReadingStore for PgStore {
    fn fetch_recent(&self, station_id: &str, limit: usize) -> Result<Vec<Reading>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = self
            .client()?
            .query(
                &format!(
                    "SELECT {} FROM flood_alert.readings
                     WHERE station_id = $1
                     ORDER BY reading_time DESC
                     LIMIT $2",
                    READING_COLUMNS
                ),
                &[&station_id, &limit],
            )
            .map_err(query_error)?;
        rows.iter().map(reading_from_row).collect()
    }

    fn fetch_in_window(&self, station_id: &str, since: DateTime<Utc>) -> Result<Vec<Reading>, StoreError> {
        let rows = self
            .client()?
            .query(
                &format!(
                    "SELECT {} FROM flood_alert.readings
                     WHERE station_id = $1 AND reading_time >= $2",
                    READING_COLUMNS
                ),
                &[&station_id, &since],
            )
            .map_err(query_error)?;
        rows.iter().map(reading_from_row).collect()
    }

    fn insert_reading(&self, reading: &Reading) -> Result<(), StoreError> {
        let level = f64_to_decimal(reading.water_level, "water_level")?;
        let battery = i16::from(reading.battery_level);
        self.client()?
            .execute(
                "INSERT INTO flood_alert.readings
                 (station_id, water_level, battery_level, status, reading_time)
                 VALUES ($1, $2, $3, $4, $5)",
                &[
                    &reading.station_id,
                    &level,
                    &battery,
                    &reading.status.as_str(),
                    &reading.timestamp,
                ],
            )
            .map_err(query_error)?;
        Ok(())
    }
}

impl StationRegistry for PgStore {
    fn list_stations(&self) -> Result<Vec<Station>, StoreError> {
        let rows = self
            .client()?
            .query(
                &format!("SELECT {} FROM flood_alert.stations ORDER BY station_id", STATION_COLUMNS),
                &[],
            )
            .map_err(query_error)?;
        rows.iter().map(station_from_row).collect()
    }

    fn find_station(&self, station_id: &str) -> Result<Option<Station>, StoreError> {
        let rows = self
            .client()?
            .query(
                &format!("SELECT {} FROM flood_alert.stations WHERE station_id = $1", STATION_COLUMNS),
                &[&station_id],
            )
            .map_err(query_error)?;
        rows.first().map(station_from_row).transpose()
    }

    fn add_station(&self, station: Station) -> Result<Station, StoreError> {
        let warning = f64_to_decimal(station.thresholds.warning, "warning_threshold")?;
        let danger = f64_to_decimal(station.thresholds.danger, "danger_threshold")?;
        let rows = self
            .client()?
            .query(
                &format!(
                    "INSERT INTO flood_alert.stations
                     (station_id, name, latitude, longitude, warning_threshold, danger_threshold, last_updated)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)
                     ON CONFLICT (station_id) DO NOTHING
                     RETURNING {}",
                    STATION_COLUMNS
                ),
                &[
                    &station.station_id,
                    &station.name,
                    &station.location.lat,
                    &station.location.lng,
                    &warning,
                    &danger,
                    &station.last_updated,
                ],
            )
            .map_err(query_error)?;
        rows.first()
            .map(station_from_row)
            .transpose()?
            .ok_or(StoreError::DuplicateStation(station.station_id))
    }

    fn update_thresholds(&self, station_id: &str, thresholds: Thresholds) -> Result<Station, StoreError> {
        let warning = f64_to_decimal(thresholds.warning, "warning_threshold")?;
        let danger = f64_to_decimal(thresholds.danger, "danger_threshold")?;
        let rows = self
            .client()?
            .query(
                &format!(
                    "UPDATE flood_alert.stations
                     SET warning_threshold = $2, danger_threshold = $3
                     WHERE station_id = $1
                     RETURNING {}",
                    STATION_COLUMNS
                ),
                &[&station_id, &warning, &danger],
            )
            .map_err(query_error)?;
        rows.first()
            .map(station_from_row)
            .transpose()?
            .ok_or_else(|| StoreError::StationNotFound(station_id.to_string()))
    }

    fn touch(&self, station_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let updated = self
            .client()?
            .execute(
                "UPDATE flood_alert.stations SET last_updated = $2 WHERE station_id = $1",
                &[&station_id, &at],
            )
            .map_err(query_error)?;
        if updated == 0 {
            return Err(StoreError::StationNotFound(station_id.to_string()));
        }
        Ok(())
    }
}
