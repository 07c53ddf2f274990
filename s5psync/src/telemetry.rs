//! Logging initialization.
//!
//! One-shot tracing setup shared by the CLI and any embedding binary. The
//! filter string follows `tracing_subscriber::EnvFilter` syntax and is
//! overridable via `RUST_LOG`.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// `default_filter` is used when `RUST_LOG` is not set (e.g. `"info"` or
/// `"s5psync=debug"`). Calling this twice is a no-op; the second call's
/// filter is ignored.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
