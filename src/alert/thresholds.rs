//! Water level threshold classification.
//!
//! Used on the write path (freezing a reading's status at insert time) and
//! by the forecast engine (classifying projected levels against the
//! station's current thresholds).

use crate::model::{AlertStatus, Thresholds};

/// Classifies a water level against a station's thresholds.
///
/// Boundary values belong to the more severe bucket: a level exactly at the
/// warning threshold is WARNING, exactly at danger is DANGER. Danger is
/// checked first, so an inverted pair (`warning > danger`) never yields
/// WARNING for a level at or above danger.
pub fn classify_level(level: f64, thresholds: &Thresholds) -> AlertStatus {
    if level >= thresholds.danger {
        AlertStatus::Danger
    } else if level >= thresholds.warning {
        AlertStatus::Warning
    } else {
        AlertStatus::Normal
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
