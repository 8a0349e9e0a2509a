//! Logging setup for Stratum.
//!
//! Library code only emits `tracing` events. An application that wants them printed
//! either installs its own subscriber or calls [`init`], which installs one when the
//! `tracing-subscriber` feature is enabled.
//!
//! # Environment Variables
//!
//! - `STRATUM_DEBUG=true|1|yes` - Enable debug logging
//! - `STRATUM_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific level
//! - `STRATUM_LOG_FORMAT=json|pretty|compact` - Output format (default: json)
//!
//! ```rust,no_run
//! use stratum_query::logging;
//!
//! logging::init();
//! ```

use std::env;
use std::fmt;
use std::sync::Once;

use serde::{Deserialize, Serialize};

use crate::config::DebugConfig;

static INIT: Once = Once::new();

const DEBUG_VAR: &str = "STRATUM_DEBUG";
const LEVEL_VAR: &str = "STRATUM_LOG_LEVEL";
const FORMAT_VAR: &str = "STRATUM_LOG_FORMAT";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line, human-readable.
    Pretty,
    /// Single-line, human-readable.
    Compact,
}

impl LogFormat {
    /// Parse a format name; unknown names fall back to JSON.
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "pretty" => Self::Pretty,
            "compact" => Self::Compact,
            _ => Self::Json,
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Pretty => write!(f, "pretty"),
            Self::Compact => write!(f, "compact"),
        }
    }
}

/// Resolved logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Whether anything should be installed at all.
    pub enabled: bool,
    /// Level directive.
    pub level: &'static str,
    /// Output format.
    pub format: LogFormat,
}

impl LogSettings {
    /// Resolve settings from raw values.
    ///
    /// Logging is enabled when debug is on or a level is given. An unknown level
    /// falls back to `debug` in debug mode and `warn` otherwise.
    pub fn resolve(debug: bool, level: Option<&str>, format: Option<&str>) -> Self {
        let fallback = if debug { "debug" } else { "warn" };
        let resolved = match level.map(str::to_lowercase).as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => fallback,
        };
        Self {
            enabled: debug || level.is_some(),
            level: resolved,
            format: format.map(LogFormat::parse).unwrap_or_default(),
        }
    }

    /// Resolve settings from the `STRATUM_*` environment variables.
    pub fn from_env() -> Self {
        let level = env::var(LEVEL_VAR).ok();
        let format = env::var(FORMAT_VAR).ok();
        Self::resolve(is_debug_enabled(), level.as_deref(), format.as_deref())
    }

    /// Resolve settings from the `[debug]` config section.
    ///
    /// Environment variables override the file.
    pub fn from_config(config: &DebugConfig) -> Self {
        let level = env::var(LEVEL_VAR).ok().or_else(|| config.log_level.clone());
        let mut settings =
            Self::resolve(config.enabled || is_debug_enabled(), level.as_deref(), None);
        settings.format = env::var(FORMAT_VAR)
            .ok()
            .map(|f| LogFormat::parse(&f))
            .unwrap_or(config.log_format);
        settings
    }
}

/// Whether `STRATUM_DEBUG` is set to `true`, `1`, or `yes` (case-insensitive).
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var(DEBUG_VAR)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Initialize logging from the environment.
///
/// Subsequent calls (and calls to [`init_with`]) are no-ops.
pub fn init() {
    init_with(LogSettings::from_env());
}

/// Initialize logging from the `[debug]` config section.
pub fn init_from_config(config: &DebugConfig) {
    init_with(LogSettings::from_config(config));
}

/// Initialize logging with resolved settings.
pub fn init_with(settings: LogSettings) {
    INIT.call_once(|| {
        if !settings.enabled {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = settings.level;
            let filter = EnvFilter::try_new(format!(
                "stratum={},stratum_query={}",
                level, level
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            let installed = match settings.format {
                LogFormat::Json => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().json())
                    .try_init(),
                LogFormat::Compact => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().compact())
                    .try_init(),
                LogFormat::Pretty => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().pretty())
                    .try_init(),
            };

            if installed.is_ok() {
                tracing::info!(level = level, format = %settings.format, "Stratum logging initialized");
            }
        }
    });
}
