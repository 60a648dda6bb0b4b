//! Logging macros for the client crate.
//!
//! Thin wrappers over `tracing` so call sites stay uniform across the crate.
//! Arguments are forwarded untouched, so structured fields work:
//!
//! ```rust,ignore
//! log_info!(generation = %gen, url = %url, "opening transport");
//! ```

/// Subscriber filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "presence_client=debug";

/// Install a formatting subscriber driven by `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Log an info message
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        ::tracing::info!($($arg)*)
    };
}

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        ::tracing::error!($($arg)*)
    };
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        ::tracing::warn!($($arg)*)
    };
}

/// Log a debug message
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        ::tracing::debug!($($arg)*)
    };
}
