//! Report assembly.
//!
//! `AnalyticsService` snapshots the station list (and with it every station's
//! thresholds) once per report, fans out one store read per station on a
//! thread pool, and hands the fetched windows to the pure analysis
//! functions. A failed read fails the whole report; stations short on
//! history are skipped and logged at debug level.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::{Arc, mpsc};
use threadpool::ThreadPool;
use tracing::{debug, info};

use crate::analysis::AnalyticsError;
use crate::analysis::correlation::{self, CorrelationPair, StationRef, StationSeries};
use crate::analysis::forecast::{self, PredictionPoint};
use crate::analysis::risk::{self, RiskAssessment, RiskTier};
use crate::analysis::statistics::{self, StatisticsReport};
use crate::analysis::trend::{self, TrendDirection};
use crate::config::AnalyticsConfig;
use crate::model::{Reading, Station, StoreError};
use crate::store::{ReadingStore, StationRegistry};

/// Average rates beyond ±0.15 m/h flip the system-wide trend.
pub const SYSTEM_TREND_BAND_M_PER_H: f64 = 0.15;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Forecast for one station.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationPrediction {
    pub station_id: String,
    pub name: String,
    #[serde(serialize_with = "crate::model::round_2")]
    pub current_level: f64,
    pub trend: TrendDirection,
    #[serde(serialize_with = "crate::model::round_3")]
    pub change_rate: f64,
    pub predictions: Vec<PredictionPoint>,
}

/// One station's entry in the trends report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationTrend {
    pub station_id: String,
    pub name: String,
    #[serde(serialize_with = "crate::model::round_3")]
    pub change_rate: f64,
    #[serde(serialize_with = "crate::model::round_2")]
    pub current_level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendsReport {
    pub rising: Vec<StationTrend>,
    pub falling: Vec<StationTrend>,
    pub stable: Vec<StationTrend>,
    pub system_trend: TrendDirection,
    #[serde(serialize_with = "crate::model::round_3")]
    pub avg_change_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskForecastReport {
    pub high_risk: Vec<RiskAssessment>,
    pub medium_risk: Vec<RiskAssessment>,
    pub low_risk: Vec<RiskAssessment>,
}

impl RiskForecastReport {
    fn push(&mut self, assessment: RiskAssessment) {
        match assessment.tier {
            RiskTier::High => self.high_risk.push(assessment),
            RiskTier::Medium => self.medium_risk.push(assessment),
            RiskTier::Low => self.low_risk.push(assessment),
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct AnalyticsService {
    registry: Arc<dyn StationRegistry>,
    store: Arc<dyn ReadingStore>,
    config: AnalyticsConfig,
    pool: ThreadPool,
}

impl AnalyticsService {
    pub fn new(
        registry: Arc<dyn StationRegistry>,
        store: Arc<dyn ReadingStore>,
        config: AnalyticsConfig,
    ) -> Self {
        let pool = ThreadPool::with_name("station-fetch".to_string(), config.worker_threads.max(1));
        Self {
            registry,
            store,
            config,
            pool,
        }
    }

    pub fn registry(&self) -> &Arc<dyn StationRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn ReadingStore> {
        &self.store
    }

    /// Runs `fetch` for every station on the pool and returns the results in
    /// station order. The first store error aborts the report.
    fn fetch_each<T, F>(&self, stations: &[Station], fetch: F) -> Result<Vec<T>, AnalyticsError>
    where
        T: Send + 'static,
        F: Fn(&dyn ReadingStore, &Station) -> Result<T, StoreError> + Send + Sync + 'static,
    {
        let fetch = Arc::new(fetch);
        let (tx, rx) = mpsc::channel();

        for (index, station) in stations.iter().cloned().enumerate() {
            let tx = tx.clone();
            let store = Arc::clone(&self.store);
            let fetch = Arc::clone(&fetch);
            self.pool.execute(move || {
                let result = fetch(store.as_ref(), &station);
                // Receiver is gone only if the report already failed.
                let _ = tx.send((index, result));
            });
        }
        drop(tx);

        let mut slots: Vec<Option<T>> = stations.iter().map(|_| None).collect();
        for (index, result) in rx {
            slots[index] = Some(result?);
        }

        slots
            .into_iter()
            .zip(stations)
            .map(|(slot, station)| {
                slot.ok_or_else(|| AnalyticsError::WorkerFailed(station.station_id.clone()))
            })
            .collect()
    }

    /// Stations paired with their `limit` most recent readings.
    fn recent_windows(&self, limit: usize) -> Result<Vec<(Station, Vec<Reading>)>, AnalyticsError> {
        let stations = self.registry.list_stations()?;
        let windows = self.fetch_each(&stations, move |store, station| {
            store.fetch_recent(&station.station_id, limit)
        })?;
        Ok(stations.into_iter().zip(windows).collect())
    }

    /// Drops windows shorter than the minimum history.
    fn with_enough_history(
        &self,
        windows: Vec<(Station, Vec<Reading>)>,
        report: &str,
    ) -> Vec<(Station, Vec<Reading>)> {
        let min_history = self.config.min_history;
        windows
            .into_iter()
            .filter(|(station, readings)| {
                let enough = readings.len() >= min_history;
                if !enough {
                    debug!(
                        report,
                        station_id = %station.station_id,
                        readings = readings.len(),
                        min_history,
                        "skipping station with insufficient history"
                    );
                }
                enough
            })
            .collect()
    }

    /// Six-hour forecast for every station with enough history.
    pub fn predictions(&self) -> Result<Vec<StationPrediction>, AnalyticsError> {
        let windows = self.recent_windows(self.config.prediction_window)?;
        let windows = self.with_enough_history(windows, "predictions");

        let predictions: Vec<StationPrediction> = windows
            .iter()
            .filter_map(|(station, readings)| {
                let f = forecast::forecast(readings, &station.thresholds)?;
                Some(StationPrediction {
                    station_id: station.station_id.clone(),
                    name: station.name.clone(),
                    current_level: f.current_level,
                    trend: f.trend.trend,
                    change_rate: f.trend.change_rate,
                    predictions: f.predictions,
                })
            })
            .collect();

        info!(stations = predictions.len(), "predictions report built");
        Ok(predictions)
    }

    /// Stations bucketed by direction, plus the fleet-average rate.
    pub fn trends(&self) -> Result<TrendsReport, AnalyticsError> {
        let windows = self.recent_windows(self.config.trend_window)?;
        let windows = self.with_enough_history(windows, "trends");

        let mut report = TrendsReport {
            rising: Vec::new(),
            falling: Vec::new(),
            stable: Vec::new(),
            system_trend: TrendDirection::Stable,
            avg_change_rate: 0.0,
        };
        let mut total_rate = 0.0;

        for (station, readings) in &windows {
            let Some(newest) = readings.first() else { continue };
            let change_rate = trend::change_rate(readings);
            total_rate += change_rate;

            let entry = StationTrend {
                station_id: station.station_id.clone(),
                name: station.name.clone(),
                change_rate,
                current_level: newest.water_level,
            };
            match TrendDirection::from_rate(change_rate) {
                TrendDirection::Rising => report.rising.push(entry),
                TrendDirection::Falling => report.falling.push(entry),
                TrendDirection::Stable => report.stable.push(entry),
            }
        }

        if !windows.is_empty() {
            report.avg_change_rate = total_rate / windows.len() as f64;
        }
        report.system_trend = if report.avg_change_rate > SYSTEM_TREND_BAND_M_PER_H {
            TrendDirection::Rising
        } else if report.avg_change_rate < -SYSTEM_TREND_BAND_M_PER_H {
            TrendDirection::Falling
        } else {
            TrendDirection::Stable
        };

        info!(
            rising = report.rising.len(),
            falling = report.falling.len(),
            stable = report.stable.len(),
            "trends report built"
        );
        Ok(report)
    }

    /// Significant pairwise correlations, strongest first.
    pub fn correlations(&self) -> Result<Vec<CorrelationPair>, AnalyticsError> {
        let windows = self.recent_windows(self.config.correlation_window)?;
        let series: Vec<StationSeries> = windows
            .into_iter()
            .map(|(station, readings)| StationSeries {
                station: StationRef {
                    id: station.station_id,
                    name: station.name,
                },
                levels: readings.iter().map(|r| r.water_level).collect(),
            })
            .collect();

        let pairs = correlation::correlate_stations(&series);
        info!(stations = series.len(), pairs = pairs.len(), "correlations report built");
        Ok(pairs)
    }

    /// Stations bucketed by estimated time to their warning threshold.
    pub fn risk_forecast(&self) -> Result<RiskForecastReport, AnalyticsError> {
        let windows = self.recent_windows(self.config.prediction_window)?;
        let windows = self.with_enough_history(windows, "risk_forecast");

        let mut report = RiskForecastReport::default();
        for (station, readings) in &windows {
            if let Some(f) = forecast::forecast(readings, &station.thresholds) {
                report.push(risk::assess(&station.station_id, &station.name, &f, &station.thresholds));
            }
        }

        info!(
            high = report.high_risk.len(),
            medium = report.medium_risk.len(),
            low = report.low_risk.len(),
            "risk forecast built"
        );
        Ok(report)
    }

    /// Fleet statistics over the trailing window ending now.
    pub fn statistics(&self) -> Result<StatisticsReport, AnalyticsError> {
        self.statistics_at(Utc::now())
    }

    /// Fleet statistics over the trailing window ending at `now`.
    pub fn statistics_at(&self, now: DateTime<Utc>) -> Result<StatisticsReport, AnalyticsError> {
        let hours = self.config.statistics_window_hours;
        let since = Duration::try_hours(hours)
            .filter(|_| hours > 0)
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or(AnalyticsError::InvalidWindow(hours))?;
        let stations = self.registry.list_stations()?;
        let windows = self.fetch_each(&stations, move |store, station| {
            store.fetch_in_window(&station.station_id, since)
        })?;

        let report = statistics::aggregate(
            stations
                .iter()
                .zip(&windows)
                .map(|(station, readings)| (station, readings.as_slice())),
        );

        info!(
            active = report.data_quality.active_stations,
            readings = report.total_readings,
            "statistics report built"
        );
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlertStatus, Location, Thresholds};
    use crate::store::memory::MemoryStore;

    fn t0() -> DateTime<Utc> {
        "2024-05-01T00:00:00Z".parse().unwrap()
    }

    fn station(id: &str) -> Station {
        Station {
            station_id: id.to_string(),
            name: format!("{} gauge", id),
            location: Location { lat: 6.9, lng: 80.0 },
            thresholds: Thresholds::default(),
            last_updated: t0(),
        }
    }

    fn service_with(store: MemoryStore) -> AnalyticsService {
        let store = Arc::new(store);
        AnalyticsService::new(store.clone(), store, AnalyticsConfig::default())
    }

    fn add_hourly(store: &MemoryStore, id: &str, levels_oldest_first: &[f64]) {
        for (i, &level) in levels_oldest_first.iter().enumerate() {
            store
                .insert_reading(&Reading {
                    station_id: id.to_string(),
                    water_level: level,
                    battery_level: 90,
                    status: AlertStatus::Normal,
                    timestamp: t0() + Duration::hours(i as i64),
                })
                .unwrap();
        }
    }

    #[test]
    fn test_fetch_each_preserves_station_order() {
        let stations: Vec<Station> = (0..16).map(|i| station(&format!("s{:02}", i))).collect();
        let service = service_with(MemoryStore::with_stations(stations.clone()));

        let ids = service
            .fetch_each(&stations, |_, s| Ok(s.station_id.clone()))
            .unwrap();
        let expected: Vec<String> = stations.iter().map(|s| s.station_id.clone()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_fetch_each_fails_whole_report_on_error() {
        let stations: Vec<Station> = (0..4).map(|i| station(&format!("s{}", i))).collect();
        let service = service_with(MemoryStore::with_stations(stations.clone()));

        let result: Result<Vec<()>, _> = service.fetch_each(&stations, |_, s| {
            if s.station_id == "s2" {
                Err(StoreError::Unavailable("socket closed".to_string()))
            } else {
                Ok(())
            }
        });
        assert!(matches!(result, Err(AnalyticsError::Store(StoreError::Unavailable(_)))));
    }

    #[test]
    fn test_fetch_each_reports_panicked_worker() {
        let stations = vec![station("ok"), station("boom")];
        let service = service_with(MemoryStore::with_stations(stations.clone()));

        let result: Result<Vec<()>, _> = service.fetch_each(&stations, |_, s| {
            if s.station_id == "boom" {
                panic!("sensor decode failure");
            }
            Ok(())
        });
        match result {
            Err(AnalyticsError::WorkerFailed(id)) => assert_eq!(id, "boom"),
            other => panic!("expected WorkerFailed, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_short_history_is_skipped() {
        let store = MemoryStore::with_stations(vec![station("short"), station("long")]);
        add_hourly(&store, "short", &[1.0, 1.1, 1.2, 1.3]);
        add_hourly(&store, "long", &[1.0, 1.1, 1.2, 1.3, 1.4]);
        let service = service_with(store);

        let predictions = service.predictions().unwrap();
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].station_id, "long");

        let risk = service.risk_forecast().unwrap();
        assert_eq!(risk.high_risk.len() + risk.medium_risk.len() + risk.low_risk.len(), 1);
    }

    #[test]
    fn test_system_trend_uses_average_band() {
        let store = MemoryStore::with_stations(vec![station("a"), station("b")]);
        // 0.3 m/h and 0.05 m/h: average 0.175 > 0.15.
        add_hourly(&store, "a", &[1.0, 1.3, 1.6, 1.9, 2.2]);
        add_hourly(&store, "b", &[1.0, 1.05, 1.1, 1.15, 1.2]);
        let service = service_with(store);

        let report = service.trends().unwrap();
        assert_eq!(report.rising.len(), 1);
        assert_eq!(report.stable.len(), 1);
        assert!((report.avg_change_rate - 0.175).abs() < 1e-9);
        assert_eq!(report.system_trend, TrendDirection::Rising);
    }

    #[test]
    fn test_trends_window_limits_history() {
        let store = MemoryStore::with_stations(vec![station("a")]);
        // Sharp early rise followed by a long flat tail; only the last 10
        // readings fall inside the trend window.
        let mut levels = vec![0.0, 5.0];
        levels.extend(std::iter::repeat(5.0).take(10));
        add_hourly(&store, "a", &levels);
        let service = service_with(store);

        let report = service.trends().unwrap();
        assert_eq!(report.stable.len(), 1);
        assert_eq!(report.stable[0].change_rate, 0.0);
    }

    #[test]
    fn test_statistics_rejects_out_of_range_window() {
        let store = Arc::new(MemoryStore::with_stations(vec![station("a")]));
        for hours in [0, -1, 3_000_000_000] {
            let config = AnalyticsConfig {
                statistics_window_hours: hours,
                ..AnalyticsConfig::default()
            };
            let service = AnalyticsService::new(store.clone(), store.clone(), config);
            let result = service.statistics_at(t0());
            assert!(matches!(result, Err(AnalyticsError::InvalidWindow(h)) if h == hours), "{}", hours);
        }
    }
}
