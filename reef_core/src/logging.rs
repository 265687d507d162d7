//! Logging setup for the reefdose binary.
//!
//! Output goes to stderr so plans printed on stdout stay machine-readable.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Map a `-v` count to a default filter directive
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber for a `-v` count
pub fn init(verbosity: u8) {
    init_with_level(level_for(verbosity));
}

/// Install the global subscriber with a default filter directive.
///
/// `RUST_LOG` takes precedence over `default_level` when set.
pub fn init_with_level(default_level: &str) {
    let show_target = matches!(default_level, "debug" | "trace");

    tracing_subscriber::registry()
        .with(filter_for(default_level))
        .with(
            fmt::layer()
                .compact()
                .with_target(show_target)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn filter_for(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize logging for testing (captures logs for test output)
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
