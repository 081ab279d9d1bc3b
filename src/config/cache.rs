//! Result cache configuration.

use super::{EnvLookup, non_empty, parse_or, process_env};
use std::time::Duration;

/// Configuration for the result cache and its Redis backing store
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Redis connection URL. `None` selects the in-process cache.
    pub redis_url: Option<String>,
    pub key_prefix: String,
    pub air_quality_ttl_seconds: u64,
    pub city_rankings_ttl_seconds: u64,
    /// Budget for a single connection attempt
    pub connect_timeout_ms: u64,
    /// Connection attempts per reconnect cycle
    pub reconnect_attempts: usize,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    /// After a failed cycle, cache calls fail fast for this long
    pub reconnect_cooldown_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: "ecotrack".to_string(),
            air_quality_ttl_seconds: 300,
            city_rankings_ttl_seconds: 900,
            connect_timeout_ms: 500,
            reconnect_attempts: 3,
            reconnect_base_delay_ms: 50,
            reconnect_max_delay_ms: 2_000,
            reconnect_cooldown_ms: 5_000,
        }
    }
}

impl CacheConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(&process_env)
    }

    pub fn from_lookup(lookup: EnvLookup<'_>) -> Self {
        let defaults = Self::default();
        Self {
            redis_url: redis_url(lookup),
            key_prefix: non_empty(lookup, "CACHE_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            air_quality_ttl_seconds: parse_or(
                lookup,
                "CACHE_AIR_QUALITY_TTL",
                defaults.air_quality_ttl_seconds,
            ),
            city_rankings_ttl_seconds: parse_or(
                lookup,
                "CACHE_CITY_RANKINGS_TTL",
                defaults.city_rankings_ttl_seconds,
            ),
            connect_timeout_ms: parse_or(
                lookup,
                "REDIS_CONNECT_TIMEOUT_MS",
                defaults.connect_timeout_ms,
            ),
            reconnect_attempts: parse_or(
                lookup,
                "REDIS_RECONNECT_ATTEMPTS",
                defaults.reconnect_attempts,
            )
            .max(1),
            reconnect_base_delay_ms: parse_or(
                lookup,
                "REDIS_RECONNECT_BASE_DELAY_MS",
                defaults.reconnect_base_delay_ms,
            ),
            reconnect_max_delay_ms: parse_or(
                lookup,
                "REDIS_RECONNECT_MAX_DELAY_MS",
                defaults.reconnect_max_delay_ms,
            ),
            reconnect_cooldown_ms: parse_or(
                lookup,
                "REDIS_RECONNECT_COOLDOWN_MS",
                defaults.reconnect_cooldown_ms,
            ),
        }
    }

    pub fn air_quality_ttl(&self) -> Duration {
        Duration::from_secs(self.air_quality_ttl_seconds)
    }

    pub fn city_rankings_ttl(&self) -> Duration {
        Duration::from_secs(self.city_rankings_ttl_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reconnect_cooldown(&self) -> Duration {
        Duration::from_millis(self.reconnect_cooldown_ms)
    }
}

/// `REDIS_URL` wins; otherwise a URL is assembled from `REDIS_HOST`,
/// `REDIS_PORT` and `REDIS_PASSWORD`.
fn redis_url(lookup: EnvLookup<'_>) -> Option<String> {
    if let Some(url) = non_empty(lookup, "REDIS_URL") {
        return Some(url);
    }

    let host = non_empty(lookup, "REDIS_HOST")?;
    let port: u16 = parse_or(lookup, "REDIS_PORT", 6379);
    Some(match non_empty(lookup, "REDIS_PASSWORD") {
        Some(password) => format!("redis://:{password}@{host}:{port}"),
        None => format!("redis://{host}:{port}"),
    })
}
