//! Top-level application configuration and provider mode selection.

use super::{CacheConfig, EnvLookup, MetricsConfig, non_empty, process_env};
use crate::services::upstream_client::UpstreamClientConfig;
use std::fmt;

/// Credential value that historically meant "no key, use synthetic data".
const DEVELOPMENT_SENTINEL: &str = "development";

pub const DEFAULT_OPENAQ_BASE_URL: &str = "https://api.openaq.org/v2";
pub const DEFAULT_GEOCODER_BASE_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_GEOCODER_USER_AGENT: &str = "EcoTrack/1.0";

/// Whether data comes from the real providers or the synthetic source.
///
/// Chosen once at startup; requests never switch modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderMode {
    Live,
    Mock,
}

impl ProviderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderMode::Live => "live",
            ProviderMode::Mock => "mock",
        }
    }
}

impl fmt::Display for ProviderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("PROVIDER_MODE=live requires OPENAQ_API_KEY")]
    MissingApiKey,

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub provider_mode: ProviderMode,
    pub openaq_api_key: Option<String>,
    pub openaq_base_url: String,
    pub geocoder_base_url: String,
    pub geocoder_user_agent: String,
    pub bind_address: String,
    pub cache: CacheConfig,
    pub upstream: UpstreamClientConfig,
    pub metrics: MetricsConfig,
}

impl AppConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&process_env)
    }

    pub fn from_lookup(lookup: EnvLookup<'_>) -> Result<Self, ConfigError> {
        let openaq_api_key = non_empty(lookup, "OPENAQ_API_KEY")
            .filter(|key| key != DEVELOPMENT_SENTINEL);

        let provider_mode = match non_empty(lookup, "PROVIDER_MODE") {
            None if openaq_api_key.is_some() => ProviderMode::Live,
            None => ProviderMode::Mock,
            Some(mode) => match mode.to_ascii_lowercase().as_str() {
                "live" if openaq_api_key.is_some() => ProviderMode::Live,
                "live" => return Err(ConfigError::MissingApiKey),
                "mock" => ProviderMode::Mock,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "PROVIDER_MODE",
                        value: mode,
                    });
                }
            },
        };

        let bind_address = non_empty(lookup, "BIND_ADDRESS").unwrap_or_else(|| {
            let port = non_empty(lookup, "PORT").unwrap_or_else(|| "5000".to_string());
            format!("127.0.0.1:{port}")
        });

        Ok(Self {
            provider_mode,
            openaq_api_key,
            openaq_base_url: non_empty(lookup, "OPENAQ_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAQ_BASE_URL.to_string()),
            geocoder_base_url: non_empty(lookup, "GEOCODER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEOCODER_BASE_URL.to_string()),
            geocoder_user_agent: non_empty(lookup, "GEOCODER_USER_AGENT")
                .unwrap_or_else(|| DEFAULT_GEOCODER_USER_AGENT.to_string()),
            bind_address,
            cache: CacheConfig::from_lookup(lookup),
            upstream: UpstreamClientConfig::from_lookup(lookup),
            metrics: MetricsConfig::from_lookup(lookup),
        })
    }

    /// Configuration for tests and local runs: mock data, memory cache.
    pub fn mock() -> Self {
        Self {
            provider_mode: ProviderMode::Mock,
            openaq_api_key: None,
            openaq_base_url: DEFAULT_OPENAQ_BASE_URL.to_string(),
            geocoder_base_url: DEFAULT_GEOCODER_BASE_URL.to_string(),
            geocoder_user_agent: DEFAULT_GEOCODER_USER_AGENT.to_string(),
            bind_address: "127.0.0.1:5000".to_string(),
            cache: CacheConfig::default(),
            upstream: UpstreamClientConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}
