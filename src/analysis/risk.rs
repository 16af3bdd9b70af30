//! Risk-to-alert bucketing.
//!
//! Risk measures trajectory, not current state: a station already in DANGER
//! but holding steady or falling is low risk.

use serde::Serialize;

use crate::analysis::forecast::Forecast;
use crate::model::Thresholds;

/// Rates at or below 0.05 m/h are too flat to estimate a crossing time.
pub const RISING_RATE_FLOOR_M_PER_H: f64 = 0.05;

/// Hours to warning below which a station is high risk.
pub const HIGH_RISK_HOURS: f64 = 3.0;

/// Hours to warning below which a station is medium risk.
pub const MEDIUM_RISK_HOURS: f64 = 6.0;

/// Forecast point reported as the station's predicted level.
pub const PREDICTED_LEVEL_HOURS_AHEAD: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    High,
    Medium,
    Low,
}

/// Per-station risk estimate. All values are full precision; rounding is
/// applied only when serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub station_id: String,
    pub name: String,
    #[serde(serialize_with = "crate::model::round_2")]
    pub current_level: f64,
    #[serde(serialize_with = "crate::model::round_2")]
    pub predicted_level: f64,
    #[serde(serialize_with = "crate::model::round_3")]
    pub change_rate: f64,
    #[serde(serialize_with = "crate::model::round_opt_1")]
    pub time_to_warning: Option<f64>,
    #[serde(serialize_with = "crate::model::round_opt_1")]
    pub time_to_danger: Option<f64>,
    #[serde(skip)]
    pub tier: RiskTier,
}

/// Hours until `threshold` is reached at `rate`, if the station is rising
/// above the noise floor and has not reached it yet.
pub fn time_to_threshold(current_level: f64, threshold: f64, rate: f64) -> Option<f64> {
    if rate <= RISING_RATE_FLOOR_M_PER_H {
        return None;
    }
    let distance = threshold - current_level;
    if distance > 0.0 {
        Some(distance / rate)
    } else {
        None
    }
}

/// Buckets on time-to-warning alone. Undefined time is low risk.
pub fn tier_for(time_to_warning: Option<f64>) -> RiskTier {
    match time_to_warning {
        Some(hours) if hours < HIGH_RISK_HOURS => RiskTier::High,
        Some(hours) if hours < MEDIUM_RISK_HOURS => RiskTier::Medium,
        _ => RiskTier::Low,
    }
}

/// Assesses one station from its forecast and current thresholds.
pub fn assess(station_id: &str, name: &str, forecast: &Forecast, thresholds: &Thresholds) -> RiskAssessment {
    let rate = forecast.trend.change_rate;
    let current_level = forecast.current_level;

    let time_to_warning = time_to_threshold(current_level, thresholds.warning, rate);
    let time_to_danger = time_to_threshold(current_level, thresholds.danger, rate);

    let predicted_level = forecast
        .point_at(PREDICTED_LEVEL_HOURS_AHEAD)
        .map(|p| p.level)
        .unwrap_or(current_level);

    RiskAssessment {
        station_id: station_id.to_string(),
        name: name.to_string(),
        current_level,
        predicted_level,
        change_rate: rate,
        time_to_warning,
        time_to_danger,
        tier: tier_for(time_to_warning),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::forecast::forecast;
    use crate::model::{AlertStatus, Reading};
    use chrono::{Duration, TimeZone, Utc};

    const KELANI: Thresholds = Thresholds { warning: 5.0, danger: 7.0 };

    fn hourly_window(levels_oldest_first: &[f64]) -> Vec<Reading> {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let mut readings: Vec<Reading> = levels_oldest_first
            .iter()
            .enumerate()
            .map(|(i, &level)| Reading {
                station_id: "kelani-01".to_string(),
                water_level: level,
                battery_level: 75,
                status: AlertStatus::Normal,
                timestamp: start + Duration::hours(i as i64),
            })
            .collect();
        readings.reverse();
        readings
    }

    fn assess_levels(levels: &[f64]) -> RiskAssessment {
        let f = forecast(&hourly_window(levels), &KELANI).unwrap();
        assess("kelani-01", "Kelani River - Kaduwela Bridge", &f, &KELANI)
    }

    #[test]
    fn test_time_to_threshold_requires_rising_rate() {
        assert_eq!(time_to_threshold(4.0, 5.0, 0.05), None);
        assert_eq!(time_to_threshold(4.0, 5.0, 0.0), None);
        assert_eq!(time_to_threshold(4.0, 5.0, -0.4), None);
        assert_eq!(time_to_threshold(4.0, 5.0, 0.5), Some(2.0));
    }

    #[test]
    fn test_time_to_threshold_is_none_at_or_above_threshold() {
        assert_eq!(time_to_threshold(5.0, 5.0, 0.2), None);
        assert_eq!(time_to_threshold(5.5, 5.0, 0.2), None);
    }

    #[test]
    fn test_tier_boundaries_compare_full_precision() {
        assert_eq!(tier_for(Some(2.96)), RiskTier::High);
        // Would display as "3.0" but is still under three hours.
        assert_eq!(tier_for(Some(2.999)), RiskTier::High);
        assert_eq!(tier_for(Some(3.0)), RiskTier::Medium);
        assert_eq!(tier_for(Some(5.99)), RiskTier::Medium);
        assert_eq!(tier_for(Some(6.0)), RiskTier::Low);
        assert_eq!(tier_for(None), RiskTier::Low);
    }

    #[test]
    fn test_fast_rise_below_warning_is_high_risk() {
        let a = assess_levels(&[2.0, 2.5, 3.0, 3.5, 4.0]);
        // 0.5 m/h, 1.0 m to warning: 2 h.
        assert!((a.change_rate - 0.5).abs() < 1e-9);
        assert!((a.time_to_warning.unwrap() - 2.0).abs() < 1e-9);
        assert!((a.time_to_danger.unwrap() - 6.0).abs() < 1e-9);
        assert_eq!(a.tier, RiskTier::High);
    }

    #[test]
    fn test_moderate_rise_is_medium_risk() {
        // 0.25 m/h from 4.0: 4 h to warning.
        let a = assess_levels(&[3.0, 3.25, 3.5, 3.75, 4.0]);
        assert!((a.time_to_warning.unwrap() - 4.0).abs() < 1e-9);
        assert_eq!(a.tier, RiskTier::Medium);
    }

    #[test]
    fn test_falling_station_in_danger_is_low_risk() {
        let a = assess_levels(&[9.0, 8.8, 8.6, 8.4, 8.2]);
        assert!(a.change_rate < 0.0);
        assert_eq!(a.time_to_warning, None);
        assert_eq!(a.time_to_danger, None);
        assert_eq!(a.tier, RiskTier::Low);
    }

    #[test]
    fn test_slow_rise_never_medium_or_high() {
        // 0.04 m/h, just under the floor, 0.2 m below warning.
        let a = assess_levels(&[4.64, 4.68, 4.72, 4.76, 4.8]);
        assert!(a.change_rate <= RISING_RATE_FLOOR_M_PER_H);
        assert_eq!(a.tier, RiskTier::Low);
    }

    #[test]
    fn test_already_past_warning_has_no_time_to_warning() {
        let a = assess_levels(&[4.0, 4.2, 4.4, 4.6, 4.8, 5.0]);
        assert_eq!(a.time_to_warning, None);
        assert!((a.time_to_danger.unwrap() - 10.0).abs() < 1e-9);
        assert!((a.predicted_level - 6.0).abs() < 1e-9);
        assert_eq!(a.tier, RiskTier::Low);
    }

    #[test]
    fn test_assessment_serializes_rounded_values() {
        let a = RiskAssessment {
            station_id: "kalu-01".to_string(),
            name: "Kalu Ganga - Ratnapura".to_string(),
            current_level: 4.12345,
            predicted_level: 5.98765,
            change_rate: 0.37777,
            time_to_warning: Some(2.96),
            time_to_danger: None,
            tier: RiskTier::High,
        };
        let value = serde_json::to_value(&a).unwrap();
        assert_eq!(value["stationId"], "kalu-01");
        assert_eq!(value["currentLevel"], 4.12);
        assert_eq!(value["predictedLevel"], 5.99);
        assert_eq!(value["changeRate"], 0.378);
        assert_eq!(value["timeToWarning"], 3.0);
        assert!(value["timeToDanger"].is_null());
        assert!(value.get("tier").is_none());
    }
}
