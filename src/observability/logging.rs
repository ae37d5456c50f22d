//! Logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;

/// Environment variable holding the log filter directive.
pub const LOG_FILTER_ENV: &str = "CORTEX_LOG";

/// Environment variable selecting the log format.
pub const LOG_FORMAT_ENV: &str = "CORTEX_LOG_FORMAT";

const DEFAULT_FILTER: &str = "warn";
const VERBOSE_FILTER: &str = "info";

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format string. Unknown values fall back to pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `warn` or `cortex=debug`.
    pub filter: String,
    /// Event format.
    pub format: LogFormat,
    /// Append-mode log file. Logs go to stderr when unset.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Resolves logging settings.
    ///
    /// Precedence, highest first: environment variables, config file settings,
    /// then `--verbose` (which only raises the default filter to `info`).
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        let mut config = Self::default();
        if verbose {
            config.filter = VERBOSE_FILTER.to_string();
        }

        if let Some(settings) = settings {
            if let Some(level) = settings.level.as_deref().filter(|l| !l.trim().is_empty()) {
                config.filter = level.trim().to_string();
            }
            if let Some(format) = settings.format.as_deref() {
                config.format = LogFormat::parse(format);
            }
            config.file.clone_from(&settings.file);
        }

        if let Some(filter) = env_value(LOG_FILTER_ENV) {
            config.filter = filter;
        }
        if let Some(format) = env_value(LOG_FORMAT_ENV) {
            config.format = LogFormat::parse(&format);
        }

        config
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
