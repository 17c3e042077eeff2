//! Logger setup and plain message helpers.
//!
//! The crate logs through the `log` facade; binaries pick the backend. The
//! default backend is `env_logger`, configured from `RUST_LOG`.

use log::{debug, error, info, log_enabled, warn, Level, LevelFilter};

/// Initializes the logger with the `env_logger` crate.
///
/// Calling it again after a logger is installed has no effect.
pub fn init_logger() {
    let _ = env_logger::try_init();
}

/// Initializes `env_logger` with `default` as the level when `RUST_LOG` is
/// unset.
pub fn init_logger_with_level(default: LevelFilter) {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(default)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}

/// Logs an error message.
pub fn log_error(message: &str) {
    if log_enabled!(Level::Error) {
        error!("{message}");
    }
}

/// Logs a warning message.
pub fn log_warn(message: &str) {
    if log_enabled!(Level::Warn) {
        warn!("{message}");
    }
}

/// Logs an informational message.
pub fn log_info(message: &str) {
    if log_enabled!(Level::Info) {
        info!("{message}");
    }
}

/// Logs a debug message.
pub fn log_debug(message: &str) {
    if log_enabled!(Level::Debug) {
        debug!("{message}");
    }
}
