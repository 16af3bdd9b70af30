//! Rate-of-change estimation over a station's recent readings.

use serde::Serialize;

use crate::model::Reading;

/// Rates inside ±0.1 m/h are treated as sensor noise.
pub const TREND_NOISE_BAND_M_PER_H: f64 = 0.1;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Direction of a station's water level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
}

impl TrendDirection {
    /// Buckets a rate (m/h) using the ±0.1 m/h noise band.
    pub fn from_rate(rate: f64) -> Self {
        if rate > TREND_NOISE_BAND_M_PER_H {
            TrendDirection::Rising
        } else if rate < -TREND_NOISE_BAND_M_PER_H {
            TrendDirection::Falling
        } else {
            TrendDirection::Stable
        }
    }
}

/// Transient trend of a reading window. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendResult {
    #[serde(serialize_with = "crate::model::round_3")]
    pub change_rate: f64,
    pub trend: TrendDirection,
}

impl TrendResult {
    pub fn from_readings(readings: &[Reading]) -> Self {
        let change_rate = change_rate(readings);
        Self {
            change_rate,
            trend: TrendDirection::from_rate(change_rate),
        }
    }
}

/// Time-weighted average slope of a newest-first window, in meters/hour.
///
/// Sums level change and elapsed hours over adjacent (newer, older) pairs and
/// divides the totals. Pairs whose elapsed time is zero or negative contribute
/// to neither total. Fewer than two readings, or no usable pair, yields 0.
pub fn change_rate(readings: &[Reading]) -> f64 {
    if readings.len() < 2 {
        return 0.0;
    }

    let mut total_change = 0.0;
    let mut total_hours = 0.0;

    for pair in readings.windows(2) {
        let (newer, older) = (&pair[0], &pair[1]);
        let hours = (newer.timestamp - older.timestamp).num_milliseconds() as f64
            / 1000.0
            / SECONDS_PER_HOUR;

        if hours > 0.0 {
            total_change += newer.water_level - older.water_level;
            total_hours += hours;
        }
    }

    if total_hours > 0.0 {
        total_change / total_hours
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
