//! Tracing subscriber setup for the binaries.
//!
//! `RUST_LOG` wins over the configured level when set.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Install a global subscriber. Calling it twice is a no-op.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_ascii_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if installed.is_ok() {
        tracing::debug!(app = %config.app_name, "logging initialized");
    }
}
