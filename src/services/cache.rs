//! Result cache with fail-open semantics.
//!
//! The orchestrator talks to a [`ResultCache`] through `get`/`set` only. Store
//! failures are returned as [`CacheError`] so they can be logged, and the
//! orchestrator treats every one of them as a miss or a dropped write.
//!
//! Backends:
//! - [`RedisCache`]: shared store; lazily (re)connects with a bounded number
//!   of attempts per cycle and fails fast for a cooldown after a failed
//!   cycle, no background timer
//! - [`MemoryCache`]: in-process TTL map, used when no Redis URL is configured
//! - [`NoopCache`]: always misses, always accepts

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::models::{LocationQuery, RankingQuery};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio_retry::Retry;
use tracing::{debug, info, warn};

/// Key-value store with per-entry TTL.
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()>;

    /// Backend name for logs and the health endpoint.
    fn backend(&self) -> &'static str;
}

/// Build the cache selected by `config`.
///
/// A malformed Redis URL degrades to [`NoopCache`] rather than failing
/// startup.
pub fn build_cache(config: &CacheConfig) -> Arc<dyn ResultCache> {
    match &config.redis_url {
        Some(url) => match RedisCache::new(url, config.clone()) {
            Ok(cache) => {
                info!("Using Redis result cache");
                Arc::new(cache)
            }
            Err(e) => {
                warn!(error = %e, "Invalid Redis configuration, caching disabled");
                Arc::new(NoopCache)
            }
        },
        None => {
            info!("No Redis URL configured, using in-process result cache");
            Arc::new(MemoryCache::new())
        }
    }
}

/// Stable cache keys: `{prefix}:{operation}:{sha256(normalized params)}`.
pub mod keys {
    use super::*;

    pub const AIR_QUALITY: &str = "air-quality";
    pub const CITY_RANKINGS: &str = "city-rankings";

    /// Lowercased, whitespace-collapsed location text.
    pub fn normalize_location(text: &str) -> String {
        text.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    pub fn air_quality(prefix: &str, query: &LocationQuery) -> String {
        signature(
            prefix,
            AIR_QUALITY,
            &[
                ("location", normalize_location(query.text())),
                ("radius", query.radius_meters().to_string()),
            ],
        )
    }

    pub fn city_rankings(prefix: &str, query: &RankingQuery) -> String {
        signature(
            prefix,
            CITY_RANKINGS,
            &[
                ("parameter", query.parameter().as_str().to_string()),
                ("limit", query.limit().to_string()),
            ],
        )
    }

    fn signature(prefix: &str, operation: &str, params: &[(&str, String)]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(operation.as_bytes());
        for (name, value) in params {
            hasher.update(b"\x00");
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
        }
        format!("{prefix}:{operation}:{}", hex::encode(hasher.finalize()))
    }
}

/// Redis-backed cache.
pub struct RedisCache {
    client: redis::Client,
    connection: RwLock<Option<ConnectionManager>>,
    /// Set after a failed reconnect cycle; no new cycle starts before it.
    retry_after: Mutex<Option<Instant>>,
    config: CacheConfig,
}

impl RedisCache {
    /// Parse the URL; no connection is made until first use.
    pub fn new(url: &str, config: CacheConfig) -> CacheResult<Self> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            connection: RwLock::new(None),
            retry_after: Mutex::new(None),
            config,
        })
    }

    async fn connection(&self) -> CacheResult<ConnectionManager> {
        if let Some(conn) = self.connection.read().await.as_ref() {
            return Ok(conn.clone());
        }

        if self.cooling_down() {
            return Err(CacheError::Unavailable("reconnect cooldown".into()));
        }

        // Connect outside the lock; concurrent cycles may race, last one wins.
        match self.connect().await {
            Ok(conn) => {
                *self.retry_after() = None;
                *self.connection.write().await = Some(conn.clone());
                Ok(conn)
            }
            Err(e) => {
                *self.retry_after() = Some(Instant::now() + self.config.reconnect_cooldown());
                Err(e)
            }
        }
    }

    fn retry_after(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        self.retry_after.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cooling_down(&self) -> bool {
        self.retry_after().is_some_and(|until| Instant::now() < until)
    }

    /// One reconnect cycle: `reconnect_attempts` tries, linear backoff capped
    /// at `reconnect_max_delay_ms`.
    async fn connect(&self) -> CacheResult<ConnectionManager> {
        let base = self.config.reconnect_base_delay_ms;
        let max = self.config.reconnect_max_delay_ms;
        let delays = (1..self.config.reconnect_attempts as u64)
            .map(move |attempt| Duration::from_millis((attempt * base).min(max)));

        let timeout = self.config.connect_timeout();
        let result = Retry::spawn(delays, || {
            let client = self.client.clone();
            async move {
                match tokio::time::timeout(timeout, client.get_connection_manager()).await {
                    Ok(Ok(conn)) => Ok(conn),
                    Ok(Err(e)) => {
                        debug!(error = %e, "Redis connection attempt failed");
                        Err(CacheError::Command(e))
                    }
                    Err(_) => {
                        debug!("Redis connection attempt timed out");
                        Err(CacheError::Unavailable("connection timed out".into()))
                    }
                }
            }
        })
        .await;

        match &result {
            Ok(_) => info!("Connected to Redis"),
            Err(e) => warn!(
                error = %e,
                attempts = self.config.reconnect_attempts,
                "Redis unavailable, continuing without cache"
            ),
        }
        result
    }

    /// Forget the connection so the next call starts a fresh cycle.
    async fn reset(&self) {
        *self.connection.write().await = None;
    }

    async fn run<T, F, Fut>(&self, op: F) -> CacheResult<T>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: std::future::Future<Output = redis::RedisResult<T>>,
    {
        let conn = self.connection().await?;
        let outcome = match tokio::time::timeout(self.config.connect_timeout(), op(conn)).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => CacheError::Command(e),
            Err(_) => CacheError::Unavailable("command timed out".into()),
        };
        self.reset().await;
        Err(outcome)
    }
}

#[async_trait]
impl ResultCache for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.run(|mut conn| async move { conn.get::<_, Option<Vec<u8>>>(key).await })
            .await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        let seconds = ttl.as_secs().max(1);
        self.run(|mut conn| async move { conn.set_ex::<_, _, ()>(key, value, seconds).await })
            .await
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

/// In-process cache. Expired entries are purged on write.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, (Vec<u8>, Instant)>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ResultCache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let entries = self.entries();
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| Instant::now() < *expires_at)
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> CacheResult<()> {
        let now = Instant::now();
        let mut entries = self.entries();
        entries.retain(|_, (_, expires_at)| now < *expires_at);
        entries.insert(key.to_string(), (value, now + ttl));
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Cache that stores nothing.
pub struct NoopCache;

#[async_trait]
impl ResultCache for NoopCache {
    async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> CacheResult<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "none"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Pollutant;

    #[tokio::test]
    async fn test_memory_cache_round_trip_and_expiry() {
        let cache = MemoryCache::new();
        cache
            .set("k", b"value".to_vec(), Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"value".to_vec()));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_noop_cache_always_misses() {
        let cache = NoopCache;
        cache.set("k", b"v".to_vec(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreachable_redis_reports_errors() {
        let config = CacheConfig {
            redis_url: Some("redis://127.0.0.1:1".to_string()),
            connect_timeout_ms: 100,
            reconnect_attempts: 2,
            reconnect_base_delay_ms: 1,
            ..CacheConfig::default()
        };
        let cache = RedisCache::new("redis://127.0.0.1:1", config).unwrap();

        assert!(cache.get("k").await.is_err());
        assert!(cache.set("k", b"v".to_vec(), Duration::from_secs(1)).await.is_err());
    }

    fn is_cooldown<T>(result: &CacheResult<T>) -> bool {
        matches!(result, Err(CacheError::Unavailable(message)) if message == "reconnect cooldown")
    }

    #[tokio::test]
    async fn test_failed_cycle_fails_fast_until_cooldown_ends() {
        let config = CacheConfig {
            redis_url: Some("redis://127.0.0.1:1".to_string()),
            connect_timeout_ms: 100,
            reconnect_attempts: 2,
            reconnect_base_delay_ms: 1,
            reconnect_cooldown_ms: 60_000,
            ..CacheConfig::default()
        };
        let cache = RedisCache::new("redis://127.0.0.1:1", config.clone()).unwrap();

        let read = cache.get("k").await;
        assert!(read.is_err() && !is_cooldown(&read));
        let write = cache.set("k", b"v".to_vec(), Duration::from_secs(1)).await;
        assert!(is_cooldown(&write));

        let cache = RedisCache::new(
            "redis://127.0.0.1:1",
            CacheConfig {
                reconnect_cooldown_ms: 0,
                ..config
            },
        )
        .unwrap();
        assert!(cache.get("k").await.is_err());
        let retry = cache.get("k").await;
        assert!(retry.is_err() && !is_cooldown(&retry));
    }

    #[test]
    fn test_build_cache_selects_backend() {
        assert_eq!(build_cache(&CacheConfig::default()).backend(), "memory");

        let config = CacheConfig {
            redis_url: Some("not a url".to_string()),
            ..CacheConfig::default()
        };
        assert_eq!(build_cache(&config).backend(), "none");

        let config = CacheConfig {
            redis_url: Some("redis://localhost:6379".to_string()),
            ..CacheConfig::default()
        };
        assert_eq!(build_cache(&config).backend(), "redis");
    }

    #[test]
    fn test_keys_are_normalized() {
        let a = LocationQuery::new("  New   York ", None).unwrap();
        let b = LocationQuery::new("new york", Some(10_000)).unwrap();
        let c = LocationQuery::new("new york", Some(20_000)).unwrap();

        assert_eq!(keys::air_quality("eco", &a), keys::air_quality("eco", &b));
        assert_ne!(keys::air_quality("eco", &b), keys::air_quality("eco", &c));
        assert!(keys::air_quality("eco", &a).starts_with("eco:air-quality:"));
    }

    #[test]
    fn test_ranking_keys_differ_by_parameter() {
        let pm25 = RankingQuery::new(Some(Pollutant::Pm25), Some(10)).unwrap();
        let no2 = RankingQuery::new(Some(Pollutant::No2), Some(10)).unwrap();
        let default = RankingQuery::new(None, None).unwrap();

        assert_ne!(keys::city_rankings("eco", &pm25), keys::city_rankings("eco", &no2));
        assert_eq!(keys::city_rankings("eco", &pm25), keys::city_rankings("eco", &default));
    }
}
