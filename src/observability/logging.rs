//! Structured logging initialization.
//!
//! Used by the CLI binary; library consumers install their own subscriber.

use tracing_subscriber::EnvFilter;

/// Initialize a formatted subscriber.
///
/// `RUST_LOG` overrides `default_level` when set.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
