//! Logging initialization for the flywheel binary.

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

/// Filter directives, e.g. `debug` or `flywheel::locks=trace`.
pub const LOG_ENV: &str = "FLYWHEEL_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";

static INIT: OnceLock<()> = OnceLock::new();

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the stderr subscriber, filtered by `FLYWHEEL_LOG` (default `warn`).
///
/// Only the first call has an effect. Failure to install (another subscriber
/// already set) is ignored.
pub fn init() {
    INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
