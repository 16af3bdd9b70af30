//! Fleet-wide descriptive statistics over a trailing window.
//!
//! Each active station contributes one representative reading to the level
//! and battery averages and to the min/max tracking. The representative is
//! the chronologically latest reading inside the window, chosen by timestamp
//! so the result does not depend on the order the store returns rows in.
//! Every reading in the window counts toward the alert history.

use serde::Serialize;

use crate::model::{AlertStatus, Reading, Station};

/// Highest or lowest representative level seen, with its station name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelExtreme {
    #[serde(serialize_with = "crate::model::round_2")]
    pub level: f64,
    pub station: Option<String>,
}

/// Reading counts per stored status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertHistory {
    pub danger: usize,
    pub warning: usize,
    pub normal: usize,
}

impl AlertHistory {
    fn record(&mut self, status: AlertStatus) {
        match status {
            AlertStatus::Danger => self.danger += 1,
            AlertStatus::Warning => self.warning += 1,
            AlertStatus::Normal => self.normal += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuality {
    pub active_stations: usize,
    pub inactive_stations: usize,
    #[serde(serialize_with = "round_battery")]
    pub avg_battery: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsReport {
    pub total_stations: usize,
    pub total_readings: usize,
    #[serde(serialize_with = "crate::model::round_2")]
    pub avg_water_level: f64,
    pub max_water_level: LevelExtreme,
    pub min_water_level: LevelExtreme,
    pub alert_history: AlertHistory,
    pub data_quality: DataQuality,
}

fn round_battery<S: serde::Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_i64(value.round() as i64)
}

/// The latest reading by timestamp. Ties keep the first one encountered.
pub fn representative_reading(readings: &[Reading]) -> Option<&Reading> {
    readings.iter().reduce(|best, r| if r.timestamp > best.timestamp { r } else { best })
}

/// Aggregates stations and their in-window readings.
///
/// State is built fresh on every call. With no active stations both averages
/// are 0 and the min/max keep their initial values (min level +∞, max level 0,
/// no station).
pub fn aggregate<'a, I>(stations: I) -> StatisticsReport
where
    I: IntoIterator<Item = (&'a Station, &'a [Reading])>,
{
    let mut total_stations = 0;
    let mut total_readings = 0;
    let mut active_stations = 0;
    let mut inactive_stations = 0;
    let mut total_level = 0.0;
    let mut total_battery = 0.0;
    let mut max_water_level = LevelExtreme { level: 0.0, station: None };
    let mut min_water_level = LevelExtreme { level: f64::INFINITY, station: None };
    let mut alert_history = AlertHistory::default();

    for (station, readings) in stations {
        total_stations += 1;
        total_readings += readings.len();

        let Some(latest) = representative_reading(readings) else {
            inactive_stations += 1;
            continue;
        };

        active_stations += 1;
        total_level += latest.water_level;
        total_battery += f64::from(latest.battery_level);

        if latest.water_level > max_water_level.level {
            max_water_level = LevelExtreme {
                level: latest.water_level,
                station: Some(station.name.clone()),
            };
        }
        if latest.water_level < min_water_level.level {
            min_water_level = LevelExtreme {
                level: latest.water_level,
                station: Some(station.name.clone()),
            };
        }

        for reading in readings {
            alert_history.record(reading.status);
        }
    }

    let (avg_water_level, avg_battery) = if active_stations > 0 {
        (
            total_level / active_stations as f64,
            total_battery / active_stations as f64,
        )
    } else {
        (0.0, 0.0)
    };

    StatisticsReport {
        total_stations,
        total_readings,
        avg_water_level,
        max_water_level,
        min_water_level,
        alert_history,
        data_quality: DataQuality {
            active_stations,
            inactive_stations,
            avg_battery,
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Location, Thresholds};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap()
    }

    fn station(id: &str, name: &str) -> Station {
        Station {
            station_id: id.to_string(),
            name: name.to_string(),
            location: Location { lat: 6.9, lng: 79.9 },
            thresholds: Thresholds::default(),
            last_updated: now(),
        }
    }

    fn reading(id: &str, level: f64, battery: u8, status: AlertStatus, hours_ago: i64) -> Reading {
        Reading {
            station_id: id.to_string(),
            water_level: level,
            battery_level: battery,
            status,
            timestamp: now() - Duration::hours(hours_ago),
        }
    }

    #[test]
    fn test_no_active_stations_yields_zero_averages() {
        let a = station("a", "Alpha");
        let b = station("b", "Bravo");
        let empty: Vec<Reading> = Vec::new();
        let report = aggregate([(&a, empty.as_slice()), (&b, empty.as_slice())]);

        assert_eq!(report.total_stations, 2);
        assert_eq!(report.total_readings, 0);
        assert_eq!(report.avg_water_level, 0.0);
        assert_eq!(report.data_quality.avg_battery, 0.0);
        assert_eq!(report.data_quality.active_stations, 0);
        assert_eq!(report.data_quality.inactive_stations, 2);
        assert_eq!(report.max_water_level.station, None);
        assert_eq!(report.min_water_level.station, None);
    }

    #[test]
    fn test_empty_fleet() {
        let report = aggregate(std::iter::empty());
        assert_eq!(report.total_stations, 0);
        assert_eq!(report.avg_water_level, 0.0);
    }

    #[test]
    fn test_representative_is_latest_regardless_of_order() {
        let newest_first = vec![
            reading("a", 4.5, 70, AlertStatus::Normal, 1),
            reading("a", 3.0, 90, AlertStatus::Normal, 10),
        ];
        let oldest_first: Vec<Reading> = newest_first.iter().rev().cloned().collect();

        assert_eq!(representative_reading(&newest_first).unwrap().water_level, 4.5);
        assert_eq!(representative_reading(&oldest_first).unwrap().water_level, 4.5);

        let a = station("a", "Alpha");
        let r1 = aggregate([(&a, newest_first.as_slice())]);
        let r2 = aggregate([(&a, oldest_first.as_slice())]);
        assert_eq!(r1, r2);
        assert_eq!(r1.avg_water_level, 4.5);
        assert_eq!(r1.data_quality.avg_battery, 70.0);
    }

    #[test]
    fn test_averages_min_max_and_history() {
        let a = station("a", "Alpha");
        let b = station("b", "Bravo");
        let c = station("c", "Charlie");
        let ra = vec![
            reading("a", 6.0, 80, AlertStatus::Warning, 2),
            reading("a", 7.5, 60, AlertStatus::Danger, 20),
        ];
        let rb = vec![reading("b", 2.0, 91, AlertStatus::Normal, 3)];
        let rc: Vec<Reading> = Vec::new();

        let report = aggregate([
            (&a, ra.as_slice()),
            (&b, rb.as_slice()),
            (&c, rc.as_slice()),
        ]);

        assert_eq!(report.total_stations, 3);
        assert_eq!(report.total_readings, 3);
        assert_eq!(report.avg_water_level, 4.0);
        assert_eq!(report.data_quality.avg_battery, 85.5);
        assert_eq!(report.data_quality.active_stations, 2);
        assert_eq!(report.data_quality.inactive_stations, 1);
        assert_eq!(report.max_water_level.level, 6.0);
        assert_eq!(report.max_water_level.station.as_deref(), Some("Alpha"));
        assert_eq!(report.min_water_level.level, 2.0);
        assert_eq!(report.min_water_level.station.as_deref(), Some("Bravo"));
        // History counts every reading, not just representatives.
        assert_eq!(report.alert_history, AlertHistory { danger: 1, warning: 1, normal: 1 });
    }

    #[test]
    fn test_negative_levels_never_become_max() {
        let a = station("a", "Alpha");
        let ra = vec![reading("a", -0.4, 50, AlertStatus::Normal, 1)];
        let report = aggregate([(&a, ra.as_slice())]);
        assert_eq!(report.max_water_level.station, None);
        assert_eq!(report.min_water_level.station.as_deref(), Some("Alpha"));
    }

    #[test]
    fn test_report_serializes_presentation_values() {
        let a = station("a", "Alpha");
        let b = station("b", "Bravo");
        let ra = vec![reading("a", 4.111, 80, AlertStatus::Normal, 1)];
        let rb = vec![reading("b", 4.0, 85, AlertStatus::Normal, 1)];
        let report = aggregate([(&a, ra.as_slice()), (&b, rb.as_slice())]);

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["avgWaterLevel"], 4.06);
        assert_eq!(value["dataQuality"]["avgBattery"], 83);
        assert_eq!(value["maxWaterLevel"]["station"], "Alpha");
        assert_eq!(value["alertHistory"]["normal"], 2);
    }

    #[test]
    fn test_idle_fleet_serializes_min_level_as_null() {
        let report = aggregate(std::iter::empty());
        let value = serde_json::to_value(&report).unwrap();
        assert!(value["minWaterLevel"]["level"].is_null());
        assert_eq!(value["maxWaterLevel"]["level"], 0.0);
    }
}
