//! Cross-station level correlation.
//!
//! Series are aligned by recency rank, not by timestamp: element `i` of each
//! series is that station's `i`-th most recent level. Stations sampling at
//! different intervals are therefore compared approximately.

use serde::Serialize;

/// Pairs with |r| at or below this are not reported.
pub const MIN_REPORTED_CORRELATION: f64 = 0.3;

/// Pairs with |r| above this are reported as Strong.
pub const STRONG_CORRELATION: f64 = 0.7;

/// Minimum overlapping points for a coefficient to be computed.
pub const MIN_CORRELATION_POINTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CorrelationStrength {
    Moderate,
    Strong,
}

/// Station identity as it appears in a correlation pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationRef {
    pub id: String,
    pub name: String,
}

/// Recent levels of one station, most recent first.
#[derive(Debug, Clone, PartialEq)]
pub struct StationSeries {
    pub station: StationRef,
    pub levels: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationPair {
    pub station1: StationRef,
    pub station2: StationRef,
    #[serde(serialize_with = "crate::model::round_3")]
    pub correlation: f64,
    pub strength: CorrelationStrength,
}

/// Pearson correlation over the first `min(len(a), len(b))` elements.
///
/// Returns 0 when fewer than three points overlap or when either series has
/// zero variance.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < MIN_CORRELATION_POINTS {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);

    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let mut numerator = 0.0;
    let mut sum_sq_a = 0.0;
    let mut sum_sq_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        numerator += dx * dy;
        sum_sq_a += dx * dx;
        sum_sq_b += dy * dy;
    }

    let denominator = (sum_sq_a * sum_sq_b).sqrt();
    if denominator == 0.0 {
        return 0.0;
    }
    (numerator / denominator).clamp(-1.0, 1.0)
}

/// Correlates every unordered pair of stations.
///
/// Keeps pairs with |r| > 0.3, labels |r| > 0.7 Strong, and sorts by |r|
/// descending. The sort is stable, so equal magnitudes keep input order.
pub fn correlate_stations(series: &[StationSeries]) -> Vec<CorrelationPair> {
    let mut pairs = Vec::new();

    for (i, first) in series.iter().enumerate() {
        for second in &series[i + 1..] {
            let correlation = pearson(&first.levels, &second.levels);
            if correlation.abs() <= MIN_REPORTED_CORRELATION {
                continue;
            }
            let strength = if correlation.abs() > STRONG_CORRELATION {
                CorrelationStrength::Strong
            } else {
                CorrelationStrength::Moderate
            };
            pairs.push(CorrelationPair {
                station1: first.station.clone(),
                station2: second.station.clone(),
                correlation,
                strength,
            });
        }
    }

    pairs.sort_by(|a, b| b.correlation.abs().total_cmp(&a.correlation.abs()));
    pairs
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
