//! Tracing subscriber setup for the `ripper` binary.
//!
//! Logs go to stderr so that stdout carries only the aggregated report.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

/// Install the global subscriber once.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies to this crate
/// and `warn` to everything else. Later calls are no-ops.
pub fn init_logging(default_level: &str) {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("warn,ripper={}", default_level)));

        let result = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init();

        if let Err(e) = result {
            eprintln!("Failed to initialize logging: {}", e);
        }
    });
}
