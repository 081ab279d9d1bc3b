//! Logging configuration.

use super::{EnvLookup, non_empty, process_env};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines for local runs
    Pretty,
    /// One JSON object per event for log shippers
    Json,
}

/// Configuration for the tracing subscriber
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub default_filter: String,
    pub service_name: String,
    pub environment: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            default_filter: "info".to_string(),
            service_name: "ecotrack-api".to_string(),
            environment: "development".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(&process_env)
    }

    pub fn from_lookup(lookup: EnvLookup<'_>) -> Self {
        let defaults = Self::default();
        let format = match non_empty(lookup, "LOG_FORMAT").map(|f| f.to_ascii_lowercase()) {
            Some(f) if f == "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Self {
            format,
            default_filter: non_empty(lookup, "LOG_LEVEL").unwrap_or(defaults.default_filter),
            service_name: non_empty(lookup, "SERVICE_NAME").unwrap_or(defaults.service_name),
            environment: non_empty(lookup, "APP_ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }
}
