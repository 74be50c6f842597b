//! Diagnostics for the binary. Logs go to stderr so tables on stdout stay pipeable.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CRATE_TARGET: &str = "fxwatch";

/// Filter used when `RUST_LOG` is unset: warnings only, or crate debug output
/// when `verbose`.
fn default_directives(verbose: bool) -> String {
    if verbose {
        format!("warn,{CRATE_TARGET}=debug")
    } else {
        "warn".to_string()
    }
}

/// `RUST_LOG` wins when it holds any directive; `verbose` picks the fallback.
fn build_filter(verbose: bool, env_directives: Option<&str>) -> EnvFilter {
    match env_directives.map(str::trim) {
        Some(directives) if !directives.is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(default_directives(verbose)),
    }
}

/// Installs the global subscriber. Calling it twice keeps the first one.
pub fn init_logging(verbose: bool) {
    let env_directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(verbose, env_directives.as_deref());

    let installed = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .without_time(),
        )
        .with(filter)
        .try_init();
    if installed.is_err() {
        tracing::debug!("Logging already initialised");
    }
}
