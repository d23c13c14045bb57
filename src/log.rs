//! The `log` module defines an interface to the crate's internal logging
//! facilities. Model code emits messages through the five standard macros,
//! re-exported here: `error!`, `warn!`, `info!`, `debug!` and `trace!`,
//! where `error!` is the highest priority and `trace!` the lowest.
//!
//! Logging is _disabled_ by default. It is enabled or filtered with:
//!
//! - `enable_logging()`: turns on all log messages
//! - `disable_logging()`: turns off all log messages
//! - `set_log_level(level: LevelFilter)`: enables only messages with
//!   priority at least `level`
//!
//! The backend is `env_logger`; the first call to any of the functions
//! above installs it as the global logger. If the host application has
//! already installed a logger, these functions only adjust the maximum
//! level and the host's logger keeps receiving the messages.

use env_logger::Builder;
pub use ::log::{debug, error, info, trace, warn, LevelFilter};
use std::sync::Once;

// Logging disabled until a caller opts in.
const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Off;

static INIT_LOGGER: Once = Once::new();

/// Enables the logger with no level filter / full logging. Equivalent to
/// `set_log_level(LevelFilter::Trace)`.
pub fn enable_logging() {
    set_log_level(LevelFilter::Trace);
}

/// Disables logging completely. Equivalent to
/// `set_log_level(LevelFilter::Off)`.
pub fn disable_logging() {
    set_log_level(LevelFilter::Off);
}

/// Sets the global log level. A filter level of `LevelFilter::Off`
/// disables logging.
pub fn set_log_level(level: LevelFilter) {
    INIT_LOGGER.call_once(|| {
        // Ignore the error when a global logger is already installed; the
        // max-level adjustment below still applies.
        let _ = Builder::new().filter_level(DEFAULT_LOG_LEVEL).try_init();
    });
    log::set_max_level(level);
}

/// Parses a log level name (`"warn"`, `"DEBUG"`, ...) as a `LevelFilter`.
pub fn parse_log_level(name: &str) -> Result<LevelFilter, String> {
    name.parse::<LevelFilter>()
        .map_err(|_| format!("Invalid log level: {name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_level_is_idempotent() {
        set_log_level(LevelFilter::Warn);
        assert_eq!(log::max_level(), LevelFilter::Warn);
        set_log_level(LevelFilter::Off);
        assert_eq!(log::max_level(), LevelFilter::Off);
    }

    #[test]
    fn parse_level_names() {
        assert_eq!(parse_log_level("trace").unwrap(), LevelFilter::Trace);
        assert_eq!(parse_log_level("WARN").unwrap(), LevelFilter::Warn);
        assert!(parse_log_level("loud").is_err());
    }
}
