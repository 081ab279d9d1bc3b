//! Metrics configuration.

use super::{EnvLookup, non_empty, parse_or, process_env};

/// Configuration for application metrics collection
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Prefix applied to every metric name
    pub namespace: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "ecotrack".to_string(),
        }
    }
}

impl MetricsConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(&process_env)
    }

    pub fn from_lookup(lookup: EnvLookup<'_>) -> Self {
        let defaults = Self::default();
        Self {
            enabled: parse_or(lookup, "METRICS_ENABLED", defaults.enabled),
            namespace: non_empty(lookup, "METRICS_NAMESPACE").unwrap_or(defaults.namespace),
        }
    }
}
