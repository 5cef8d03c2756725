//! Logging setup for the `docload` binary using `tracing-subscriber`.
//!
//! The library only emits `tracing` events:
//!
//! - `warn`: degraded cells, skipped rows, unknown header hints
//! - `info`: run progress and summary counts
//! - `debug`: per-document progress, per-file writes
//!
//! Output goes to stderr so stdout stays free for JSON.

use std::io;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Configuration for logging behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// Level used when `RUST_LOG` is not set.
    pub level: Level,
    /// Include the module path in each line.
    pub with_target: bool,
    pub with_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            with_target: false,
            with_ansi: true,
        }
    }
}

impl LogConfig {
    /// `-d` wins over `-v`; neither means warnings only.
    pub fn from_flags(verbose: bool, debug: bool) -> Self {
        let level = if debug {
            Level::DEBUG
        } else if verbose {
            Level::INFO
        } else {
            Level::WARN
        };
        Self {
            level,
            with_target: debug,
            ..Default::default()
        }
    }
}

/// Install the global subscriber. Fails if one is already set.
pub fn init_logging(config: &LogConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(config.with_ansi)
        .with_target(config.with_target)
        .without_time();

    tracing_subscriber::registry()
        .with(build_env_filter(config.level))
        .with(layer)
        .try_init()
}

/// Build an `EnvFilter` from the given level, respecting `RUST_LOG`.
fn build_env_filter(level: Level) -> EnvFilter {
    let level_str = level.as_str().to_lowercase();

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Dependencies stay at warn.
        EnvFilter::new(format!("warn,docload={level}", level = level_str))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_from_flags() {
        assert_eq!(LogConfig::from_flags(false, false).level, Level::WARN);
        assert_eq!(LogConfig::from_flags(true, false).level, Level::INFO);
        assert_eq!(LogConfig::from_flags(true, true).level, Level::DEBUG);
        assert!(LogConfig::from_flags(false, true).with_target);
    }

    #[test]
    fn test_second_init_fails_without_panicking() {
        let config = LogConfig::default();
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
