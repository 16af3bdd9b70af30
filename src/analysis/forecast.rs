//! Short-horizon linear level forecast.
//!
//! Projects the newest level forward at the window's average rate for each
//! hour of the horizon and classifies every projection against the station's
//! current thresholds. Confidence is a fixed decay, not a modelled
//! uncertainty.

use serde::Serialize;

use crate::alert::thresholds::classify_level;
use crate::analysis::trend::TrendResult;
use crate::model::{AlertStatus, Reading, Thresholds};

/// Number of hourly forecast points.
pub const FORECAST_HORIZON_HOURS: u32 = 6;

/// Lowest confidence ever reported for a forecast point.
pub const MIN_CONFIDENCE: u32 = 40;

/// One projected level, `hours_ahead` hours after the newest reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionPoint {
    pub hours_ahead: u32,
    #[serde(serialize_with = "crate::model::round_2")]
    pub level: f64,
    pub status: AlertStatus,
    pub confidence: u32,
}

/// Forecast for one station window.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub current_level: f64,
    pub trend: TrendResult,
    pub predictions: Vec<PredictionPoint>,
}

impl Forecast {
    /// The forecast point `hours` hours ahead, if within the horizon.
    pub fn point_at(&self, hours: u32) -> Option<&PredictionPoint> {
        self.predictions.iter().find(|p| p.hours_ahead == hours)
    }
}

/// Confidence for a point `hours_ahead` hours out: 90 − 10·h, floored at 40.
pub fn confidence_for(hours_ahead: u32) -> u32 {
    90u32.saturating_sub(10 * hours_ahead).max(MIN_CONFIDENCE)
}

/// Builds the forecast for a newest-first window.
///
/// Returns `None` for an empty window. Callers gate on minimum history
/// before calling; this function does not.
pub fn forecast(readings: &[Reading], thresholds: &Thresholds) -> Option<Forecast> {
    let current_level = readings.first()?.water_level;
    let trend = TrendResult::from_readings(readings);

    let predictions = (1..=FORECAST_HORIZON_HOURS)
        .map(|hours_ahead| {
            let level = current_level + trend.change_rate * f64::from(hours_ahead);
            PredictionPoint {
                hours_ahead,
                level,
                status: classify_level(level, thresholds),
                confidence: confidence_for(hours_ahead),
            }
        })
        .collect();

    Some(Forecast {
        current_level,
        trend,
        predictions,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::trend::TrendDirection;
    use chrono::{Duration, TimeZone, Utc};

    fn hourly_window(levels_oldest_first: &[f64]) -> Vec<Reading> {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let mut readings: Vec<Reading> = levels_oldest_first
            .iter()
            .enumerate()
            .map(|(i, &level)| Reading {
                station_id: "kelani-01".to_string(),
                water_level: level,
                battery_level: 80,
                status: AlertStatus::Normal,
                timestamp: start + Duration::hours(i as i64),
            })
            .collect();
        readings.reverse();
        readings
    }

    #[test]
    fn test_confidence_sequence() {
        let confidences: Vec<u32> = (1..=6).map(confidence_for).collect();
        assert_eq!(confidences, vec![80, 70, 60, 50, 40, 40]);
    }

    #[test]
    fn test_confidence_never_below_floor() {
        assert_eq!(confidence_for(9), 40);
        assert_eq!(confidence_for(100), 40);
    }

    #[test]
    fn test_empty_window_has_no_forecast() {
        assert!(forecast(&[], &Thresholds::default()).is_none());
    }

    #[test]
    fn test_rising_window_projects_linearly() {
        let readings = hourly_window(&[4.0, 4.2, 4.4, 4.6, 4.8, 5.0]);
        let f = forecast(&readings, &Thresholds { warning: 5.0, danger: 7.0 }).unwrap();

        assert_eq!(f.current_level, 5.0);
        assert_eq!(f.trend.trend, TrendDirection::Rising);
        assert_eq!(f.predictions.len(), 6);

        let hours: Vec<u32> = f.predictions.iter().map(|p| p.hours_ahead).collect();
        assert_eq!(hours, vec![1, 2, 3, 4, 5, 6]);

        let plus5 = f.point_at(5).unwrap();
        assert!((plus5.level - 6.0).abs() < 1e-9, "got {}", plus5.level);
        assert_eq!(plus5.status, AlertStatus::Warning);
        assert_eq!(plus5.confidence, 40);
    }

    #[test]
    fn test_projection_crosses_into_danger() {
        let readings = hourly_window(&[5.0, 5.5, 6.0, 6.5, 6.5]);
        let f = forecast(&readings, &Thresholds { warning: 5.0, danger: 7.0 }).unwrap();
        // Current 6.5 rising 0.375 m/h; +2h = 7.25.
        assert_eq!(f.point_at(1).unwrap().status, AlertStatus::Warning);
        assert_eq!(f.point_at(2).unwrap().status, AlertStatus::Danger);
    }

    #[test]
    fn test_flat_window_repeats_current_level() {
        let readings = hourly_window(&[3.0, 3.0, 3.0, 3.0, 3.0]);
        let f = forecast(&readings, &Thresholds::default()).unwrap();
        assert!(f.predictions.iter().all(|p| p.level == 3.0));
        assert!(f.predictions.iter().all(|p| p.status == AlertStatus::Normal));
        assert_eq!(f.trend.trend, TrendDirection::Stable);
    }

    #[test]
    fn test_point_outside_horizon_is_none() {
        let readings = hourly_window(&[3.0, 3.1]);
        let f = forecast(&readings, &Thresholds::default()).unwrap();
        assert!(f.point_at(0).is_none());
        assert!(f.point_at(7).is_none());
    }
}
