//! Logging infrastructure for Stride.
//!
//! Log lines go to stderr so the CLI's stdout stays readable while a workout
//! is running.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging at `warn`, overridable with RUST_LOG
pub fn init() {
    init_with_level("warn")
}

/// Initialize logging at `debug` when verbose, `warn` otherwise
pub fn init_for_cli(verbose: bool) {
    init_with_level(if verbose { "debug" } else { "warn" })
}

/// Initialize logging with a specific default level
///
/// This can still be overridden by RUST_LOG environment variable. A second
/// call is ignored.
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init();

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}
