//! Alert status evaluation.
//!
//! Submodules:
//! - `thresholds` — maps a water level onto NORMAL / WARNING / DANGER.

pub mod thresholds;
