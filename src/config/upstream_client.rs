//! Configuration for the upstream provider client
//!
//! Provides environment-based configuration for the shared HTTP client with
//! the 10 second provider call budget as default.

use super::{EnvLookup, parse_or, process_env};
use crate::services::upstream_client::UpstreamClientConfig;

impl UpstreamClientConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(&process_env)
    }

    pub fn from_lookup(lookup: EnvLookup<'_>) -> Self {
        let defaults = Self::default();
        Self {
            request_timeout_seconds: parse_or(
                lookup,
                "UPSTREAM_REQUEST_TIMEOUT",
                defaults.request_timeout_seconds,
            )
            .max(1),
            connect_timeout_seconds: parse_or(
                lookup,
                "UPSTREAM_CONNECT_TIMEOUT",
                defaults.connect_timeout_seconds,
            ),
            enable_detailed_logging: parse_or(
                lookup,
                "UPSTREAM_DETAILED_LOGGING",
                defaults.enable_detailed_logging,
            ),
        }
    }
}
