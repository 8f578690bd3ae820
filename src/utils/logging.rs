//! Logging initialization
//!
//! - Respects the RUST_LOG environment variable
//! - Falls back to the configured `host.log_level`, then to "info"
//! - Respects NO_COLOR
//!
//! # Usage
//! ```rust,no_run
//! use orion_host::utils::init_logging;
//!
//! init_logging(None); // Uses RUST_LOG or defaults to "info"
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Pick the filter: RUST_LOG, then the configured filter, then "info"
fn resolve_filter(filter: Option<&str>) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    match filter {
        Some(f) if !f.trim().is_empty() => EnvFilter::new(f),
        _ => EnvFilter::new("info"),
    }
}

/// Initialize logging for the host process
///
/// # Arguments
/// * `filter` - Optional log filter from config (e.g., "info", "orion_host::module=debug").
///              RUST_LOG takes precedence when set.
///
/// Installing a second global subscriber is ignored.
pub fn init_logging(filter: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(resolve_filter(filter))
        .try_init();
}

/// Initialize logging with JSON output (for log aggregation)
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(resolve_filter(filter))
        .try_init();
}

/// Initialize logging from the host configuration
pub fn init_logging_from_config(config: &crate::config::HostConfig, json: bool) {
    let filter = Some(config.host.log_level.as_str());
    if json {
        #[cfg(feature = "json-logging")]
        {
            init_json_logging(filter);
            return;
        }
    }
    init_logging(filter);
}
