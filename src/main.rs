//! Flood Alert Service - command line entry point
//!
//! Serves the analytics HTTP API, prints individual reports, and manages the
//! station registry.
//!
//! Usage:
//!   cargo run --release -- serve --port 3000
//!   cargo run --release -- report risk
//!   cargo run --release -- seed-stations
//!   cargo run --release -- record --station kelani-01 --level 5.4 --battery 87
//!   cargo run --release -- --in-memory serve      # no database, registry from stations.toml
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string (also read from .env)
//!   RUST_LOG     - log filter, overrides --log-level

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use flood_alert_service::analysis::reports::AnalyticsService;
use flood_alert_service::config::{self, AnalyticsConfig};
use flood_alert_service::model::Thresholds;
use flood_alert_service::store::pg::PgStore;
use flood_alert_service::{endpoint, logging, stations, store};

/// Flood alert analytics over river gauge readings.
#[derive(Parser)]
#[command(name = "flood_alert_service", version)]
struct Cli {
    /// Analytics tuning file. Defaults apply if it does not exist.
    #[arg(long, default_value = "analytics.toml")]
    config: PathBuf,

    /// Station seed file.
    #[arg(long, default_value = stations::DEFAULT_STATIONS_PATH)]
    stations: PathBuf,

    /// Keep everything in memory instead of PostgreSQL. The registry is
    /// seeded from the station file and readings are lost on exit.
    #[arg(long)]
    in_memory: bool,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = logging::DEFAULT_DIRECTIVE)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve {
        #[arg(long, env = "PORT", default_value_t = 3000)]
        port: u16,
    },
    /// Compute one report and print it as JSON.
    Report {
        #[arg(value_enum)]
        kind: ReportKind,
    },
    /// Upsert the station file into PostgreSQL.
    SeedStations,
    /// Record one sensor reading.
    Record {
        #[arg(long)]
        station: String,
        #[arg(long, allow_hyphen_values = true)]
        level: f64,
        #[arg(long)]
        battery: i64,
    },
    /// Replace a station's alert thresholds.
    SetThresholds {
        #[arg(long)]
        station: String,
        #[arg(long, allow_hyphen_values = true)]
        warning: f64,
        #[arg(long, allow_hyphen_values = true)]
        danger: f64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportKind {
    Predictions,
    Trends,
    Correlations,
    Risk,
    Statistics,
}

fn build_service(cli: &Cli, config: AnalyticsConfig) -> Result<AnalyticsService, Box<dyn Error>> {
    if cli.in_memory {
        let store = Arc::new(stations::seed_memory_store(&cli.stations)?);
        info!(stations = %cli.stations.display(), "using in-memory store");
        Ok(AnalyticsService::new(store.clone(), store, config))
    } else {
        let store = Arc::new(PgStore::connect()?);
        info!("connected to PostgreSQL");
        Ok(AnalyticsService::new(store.clone(), store, config))
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_level);

    let analytics_config = config::load_analytics_config(&cli.config)?;

    match &cli.command {
        Command::SeedStations => {
            if cli.in_memory {
                return Err("seed-stations writes to PostgreSQL; drop --in-memory".into());
            }
            let store = PgStore::connect()?;
            let count = stations::seed_pg_store(&store, &cli.stations)?;
            info!(count, "stations seeded");
        }
        Command::Serve { port } => {
            let service = build_service(&cli, analytics_config)?;
            endpoint::start_endpoint_server(*port, service)?;
        }
        Command::Report { kind } => {
            let service = build_service(&cli, analytics_config)?;
            let report = match kind {
                ReportKind::Predictions => serde_json::to_value(service.predictions()?)?,
                ReportKind::Trends => serde_json::to_value(service.trends()?)?,
                ReportKind::Correlations => serde_json::to_value(service.correlations()?)?,
                ReportKind::Risk => serde_json::to_value(service.risk_forecast()?)?,
                ReportKind::Statistics => serde_json::to_value(service.statistics()?)?,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Record {
            station,
            level,
            battery,
        } => {
            if cli.in_memory {
                warn!("in-memory reading is discarded when the process exits");
            }
            let service = build_service(&cli, analytics_config)?;
            let reading = store::record_reading(
                service.registry().as_ref(),
                service.store().as_ref(),
                station,
                *level,
                *battery,
                Utc::now(),
            )?;
            println!("{}", serde_json::to_string_pretty(&reading)?);
        }
        Command::SetThresholds {
            station,
            warning,
            danger,
        } => {
            let service = build_service(&cli, analytics_config)?;
            let updated = service.registry().update_thresholds(
                station,
                Thresholds {
                    warning: *warning,
                    danger: *danger,
                },
            )?;
            println!("{}", serde_json::to_string_pretty(&updated)?);
        }
    }

    Ok(())
}
