//! Process-wide logging setup.
//!
//! `RUST_LOG` wins when set; otherwise falls back to the level passed on the
//! command line. Kept deliberately small: one compact, target-and-level
//! formatted layer, no JSON/OTLP exporters (none of the pack's simpler daemons
//! carry those and the spec names no metrics-backend requirement beyond the
//! `/metrics` text exposition).

use tracing_subscriber::EnvFilter;

pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .compact()
        .init();
}
