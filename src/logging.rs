//! Structured logging setup.
//!
//! Installs a `tracing` subscriber writing to stderr. `RUST_LOG` overrides
//! the default directive, e.g. `RUST_LOG=flood_alert_service=debug` to see
//! which stations each report skipped.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Installs the global subscriber. Safe to call more than once; later calls
/// are no-ops.
pub fn init_logging(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging(DEFAULT_DIRECTIVE);
        init_logging("debug");
        tracing::info!("logger initialised twice without panicking");
    }
}
