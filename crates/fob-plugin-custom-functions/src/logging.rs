//! Subscriber setup for hosts that run the custom functions plugin standalone
//!
//! Only available with the `logging` feature. The plugin itself only emits
//! `tracing` events prefixed with `[fob-custom-functions]`; a bundler that
//! already installs a subscriber does not need this module.
//!
//! What each level shows:
//!
//! - `error`: every message reported by the metadata generator
//! - `warn`: function names dropped from the aggregation module as duplicates
//! - `info`: generation runs and the artifacts written by `write_bundle`
//! - `debug`: per-file registration counts, bundler cwd adoption, artifact sizes

use crate::config::{ENV_PREFIX, LOG_ENV_KEY};
use std::sync::Once;
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

static INIT: Once = Once::new();

/// Variable holding a [`LogLevel`] name, e.g. `FOB_CUSTOM_FUNCTIONS_LOG=debug`
pub fn log_level_var() -> String {
    format!("{}{}", ENV_PREFIX, LOG_ENV_KEY)
}

/// How much of the plugin's activity reaches the terminal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Nothing, not even generator errors
    Silent,
    /// Generator errors only
    Error,
    /// Errors plus skipped duplicate exports
    Warn,
    /// Generation runs and written artifacts
    #[default]
    Info,
    /// Everything, including per-module registration counts
    Debug,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Silent => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    fn as_level_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Silent => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
        }
    }

    /// Level named by `FOB_CUSTOM_FUNCTIONS_LOG`, if set and valid
    pub fn from_env() -> Option<Self> {
        std::env::var(log_level_var()).ok()?.parse().ok()
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "silent" | "off" => Ok(LogLevel::Silent),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(format!("Invalid log level: {}", other)),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter())
    }
}

fn install(filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(false).without_time())
        .init();
}

/// Print plugin events at `level`; `RUST_LOG` directives are layered on top
///
/// Only the first call in a process installs a subscriber.
///
/// # Example
///
/// ```rust,no_run
/// use fob_plugin_custom_functions::logging::{init_logging, LogLevel};
/// use fob_plugin_custom_functions::{CustomFunctionsOptions, FobCustomFunctionsPlugin};
///
/// init_logging(LogLevel::Debug);
/// let plugin = FobCustomFunctionsPlugin::new(CustomFunctionsOptions::new(
///     "src/functions.ts",
///     "functions.json",
/// ));
/// ```
pub fn init_logging(level: LogLevel) {
    INIT.call_once(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(level.as_level_filter().into())
            .from_env_lossy();
        install(filter);
    });
}

/// Like [`init_logging`], taking the level from `FOB_CUSTOM_FUNCTIONS_LOG`
///
/// Without that variable, `RUST_LOG` decides, and info is the fallback.
pub fn init_logging_from_env() {
    if let Some(level) = LogLevel::from_env() {
        init_logging(level);
        return;
    }

    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy()
        });
        install(filter);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!(" off ".parse::<LogLevel>().unwrap(), LogLevel::Silent);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::default().to_string(), "info");
        assert_eq!(LogLevel::Silent.to_string(), "off");
    }

    #[test]
    #[serial]
    fn test_log_level_from_env() {
        let var = log_level_var();
        assert_eq!(var, "FOB_CUSTOM_FUNCTIONS_LOG");

        std::env::set_var(&var, "warn");
        assert_eq!(LogLevel::from_env(), Some(LogLevel::Warn));

        std::env::set_var(&var, "chatty");
        assert_eq!(LogLevel::from_env(), None);

        std::env::remove_var(&var);
        assert_eq!(LogLevel::from_env(), None);
    }
}
