/// flood_alert_service: river-gauge flood alert analytics.
///
/// # Module structure
///
/// ```text
/// flood_alert_service
/// ├── model       — shared data types (Station, Reading, AlertStatus, StoreError, …)
/// ├── config      — analytics tuning (analytics.toml) and station seed (stations.toml)
/// ├── stations    — seed validation and registry seeding
/// ├── logging     — tracing subscriber setup
/// ├── db          — PostgreSQL connection and schema validation
/// ├── store
/// │   ├── memory  — in-memory registry + reading store
/// │   └── pg      — PostgreSQL registry + reading store
/// ├── alert
/// │   └── thresholds — NORMAL / WARNING / DANGER classification
/// ├── analysis
/// │   ├── trend       — time-weighted rate of change
/// │   ├── forecast    — six-hour linear projection
/// │   ├── correlation — pairwise Pearson correlation
/// │   ├── risk        — time-to-threshold risk tiers
/// │   ├── statistics  — trailing-window fleet statistics
/// │   └── reports     — AnalyticsService, report assembly and fan-out
/// └── endpoint    — JSON HTTP API
/// ```

/// Public modules
pub mod alert;
pub mod analysis;
pub mod config;
pub mod db;
pub mod endpoint;
pub mod logging;
pub mod model;
pub mod stations;
pub mod store;
