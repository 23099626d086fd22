//! Tracing setup for the crosshash binary.
//!
//! Scores and config dumps go to stdout, so every log record lands on
//! stderr. The level comes from the `--verbose` flag unless `RUST_LOG`
//! overrides it.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. Call once, before any command runs.
pub fn init(verbose: bool, json_logs: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
