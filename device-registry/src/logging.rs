//! Logging setup for applications embedding the registry
//!
//! The crates only emit `tracing` events; nothing is printed until the
//! application installs a subscriber. This module installs one configured for
//! the common cases.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No output
    Silent,
    /// Compact stderr output for development
    Development,
    /// Verbose diagnostics with source locations
    Debug,
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid environment variable: {0}")]
    InvalidEnv(String),
}

/// Initialize logging with the specified mode
///
/// Call this before constructing a registry context so the initial resync is
/// captured.
///
/// # Examples
///
/// ```rust,ignore
/// use device_registry::logging::{init_logging, LoggingMode};
///
/// init_logging(LoggingMode::Development)?;
/// ```
///
/// # Environment Variables
///
/// - `DEVHUB_LOG_LEVEL`: filter directive (error, warn, info, debug, trace,
///   or per-target such as `property_cache=debug`)
/// - `RUST_LOG`: used when `DEVHUB_LOG_LEVEL` is unset
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::util::SubscriberInitExt;

    let Some((layer, default_level)) = output_layer(mode) else {
        return Ok(());
    };
    let filter = create_env_filter(default_level)?;

    Registry::default()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| LoggingError::TracingInit(e.to_string()))
}

/// Formatting layer and default level for a mode; `None` when silent
fn output_layer(mode: LoggingMode) -> Option<(BoxedLayer, &'static str)> {
    match mode {
        LoggingMode::Silent => None,
        LoggingMode::Development => {
            let layer = fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact()
                .boxed();
            Some((layer, "info"))
        }
        LoggingMode::Debug => {
            let layer = fmt::layer()
                .pretty()
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .boxed();
            Some((layer, "debug"))
        }
    }
}

/// Initialize logging from `DEVHUB_LOG_MODE`
///
/// - "silent" -> LoggingMode::Silent
/// - "development" -> LoggingMode::Development
/// - "debug" -> LoggingMode::Debug
///
/// Unset means silent; any other value is rejected.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = match std::env::var("DEVHUB_LOG_MODE") {
        Ok(value) => parse_mode(&value)?,
        Err(_) => LoggingMode::Silent,
    };

    init_logging(mode)
}

fn parse_mode(value: &str) -> Result<LoggingMode, LoggingError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "silent" => Ok(LoggingMode::Silent),
        "development" | "dev" => Ok(LoggingMode::Development),
        "debug" => Ok(LoggingMode::Debug),
        other => Err(LoggingError::InvalidEnv(format!("DEVHUB_LOG_MODE={}", other))),
    }
}

/// Environment filter: DEVHUB_LOG_LEVEL, then RUST_LOG, then `default_level`
fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let directives = std::env::var("DEVHUB_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_level.to_string());

    EnvFilter::try_new(&directives)
        .map_err(|e| LoggingError::InvalidEnv(format!("{}: {}", directives, e)))
}

/// Check if a global subscriber has been installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}
