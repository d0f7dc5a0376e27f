//! Structured logging setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: `RUST_LOG` wins, then `level`.
///
/// A bare level such as `debug` is scoped to this crate; anything else is
/// used as a full filter directive.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if level.contains('=') || level.contains(',') {
            EnvFilter::new(level)
        } else {
            EnvFilter::new(format!("dashboard_client={},warn", level))
        }
    })
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}
