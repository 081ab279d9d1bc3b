//! Aggregation pipeline for the two public operations.
//!
//! Each request runs validate, cache check, source selection, fetch and
//! normalize, then cache write. The cache is fail-open: a read error is a
//! miss and a write error is logged and dropped, so the caller only ever sees
//! the pipeline's own [`AirQualityError`]s.

use crate::config::{AppConfig, CacheConfig, ProviderMode};
use crate::error::{AirQualityError, PipelineResult};
use crate::models::{AirQualityResult, CityRanking, LocationQuery, RankingQuery};
use crate::services::cache::{ResultCache, keys};
use crate::services::geocoding::{LocationResolver, NominatimResolver};
use crate::services::measurements::{MeasurementProvider, OpenAqClient};
use crate::services::metrics::{AppMetrics, PipelineMetrics};
use crate::services::mock_source;
use crate::services::normalizer::{normalize_measurements, normalize_rankings};
use crate::services::upstream_client::UpstreamClient;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

enum Source {
    Live {
        resolver: Arc<dyn LocationResolver>,
        provider: Arc<dyn MeasurementProvider>,
    },
    Mock,
}

/// Entry point for air-quality lookups and city rankings.
///
/// Cheap to share behind `web::Data`; every method takes `&self`.
pub struct AirQualityService {
    source: Source,
    cache: Arc<dyn ResultCache>,
    cache_config: CacheConfig,
    metrics: Option<PipelineMetrics>,
}

impl AirQualityService {
    /// Pipeline backed by real providers.
    pub fn live(
        resolver: Arc<dyn LocationResolver>,
        provider: Arc<dyn MeasurementProvider>,
        cache: Arc<dyn ResultCache>,
        cache_config: CacheConfig,
    ) -> Self {
        Self {
            source: Source::Live { resolver, provider },
            cache,
            cache_config,
            metrics: None,
        }
    }

    /// Pipeline serving synthetic data; never touches the network.
    pub fn mock(cache: Arc<dyn ResultCache>, cache_config: CacheConfig) -> Self {
        Self {
            source: Source::Mock,
            cache,
            cache_config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: PipelineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Wire up the pipeline for the configured provider mode.
    pub fn from_config(
        config: &AppConfig,
        cache: Arc<dyn ResultCache>,
        metrics: Option<&AppMetrics>,
    ) -> PipelineResult<Self> {
        let service = match config.provider_mode {
            ProviderMode::Mock => {
                info!("Serving mock provider data");
                Self::mock(cache, config.cache.clone())
            }
            ProviderMode::Live => {
                let api_key = config.openaq_api_key.as_deref().ok_or_else(|| {
                    AirQualityError::Internal("Live mode requires a provider API key".into())
                })?;
                let client = UpstreamClient::new(
                    config.upstream.clone(),
                    metrics.map(|m| m.upstream.clone()),
                )
                .map_err(|e| AirQualityError::Internal(format!("HTTP client setup failed: {e}")))?;

                let resolver = NominatimResolver::new(
                    client.clone(),
                    &config.geocoder_base_url,
                    &config.geocoder_user_agent,
                )?;
                let provider = OpenAqClient::new(client, &config.openaq_base_url, api_key)?;

                info!(
                    geocoder = %config.geocoder_base_url,
                    provider = %config.openaq_base_url,
                    "Serving live provider data"
                );
                Self::live(
                    Arc::new(resolver),
                    Arc::new(provider),
                    cache,
                    config.cache.clone(),
                )
            }
        };

        Ok(match metrics {
            Some(m) => service.with_metrics(m.pipeline.clone()),
            None => service,
        })
    }

    pub fn mode(&self) -> ProviderMode {
        match self.source {
            Source::Live { .. } => ProviderMode::Live,
            Source::Mock => ProviderMode::Mock,
        }
    }

    pub fn cache_backend(&self) -> &'static str {
        self.cache.backend()
    }

    /// Current measurements near a free-text location.
    ///
    /// `radius_meters` defaults to 10 km and must lie in `[1000, 100000]`.
    pub async fn get_air_quality(
        &self,
        location: &str,
        radius_meters: Option<i64>,
    ) -> PipelineResult<AirQualityResult> {
        let query = LocationQuery::new(location, radius_meters)?;
        let key = keys::air_quality(&self.cache_config.key_prefix, &query);

        self.cached(
            keys::AIR_QUALITY,
            key,
            self.cache_config.air_quality_ttl(),
            || self.fetch_air_quality(&query),
        )
        .await
    }

    /// Locations ranked by their average for one pollutant, provider order kept.
    pub async fn get_city_rankings(
        &self,
        parameter: Option<&str>,
        limit: Option<i64>,
    ) -> PipelineResult<Vec<CityRanking>> {
        let query = RankingQuery::parse(parameter, limit)?;
        let key = keys::city_rankings(&self.cache_config.key_prefix, &query);

        self.cached(
            keys::CITY_RANKINGS,
            key,
            self.cache_config.city_rankings_ttl(),
            || self.fetch_city_rankings(&query),
        )
        .await
    }

    async fn fetch_air_quality(&self, query: &LocationQuery) -> PipelineResult<AirQualityResult> {
        let (resolver, provider) = match &self.source {
            Source::Mock => return Ok(mock_source::air_quality()),
            Source::Live { resolver, provider } => (resolver, provider),
        };

        let resolved = resolver.resolve(query.text()).await?;
        let records = provider
            .fetch_measurements(resolved.coordinates(), query.radius_meters())
            .await?;
        let measurements = normalize_measurements(records)?;

        Ok(AirQualityResult {
            coordinates: resolved.coordinates(),
            location: resolved.display_name,
            measurements,
        })
    }

    async fn fetch_city_rankings(&self, query: &RankingQuery) -> PipelineResult<Vec<CityRanking>> {
        match &self.source {
            Source::Mock => Ok(mock_source::city_rankings()),
            Source::Live { provider, .. } => {
                let records = provider
                    .fetch_rankings(query.parameter(), query.limit())
                    .await?;
                normalize_rankings(records, query.parameter())
            }
        }
    }

    async fn cached<T, F, Fut>(
        &self,
        operation: &'static str,
        key: String,
        ttl: Duration,
        compute: F,
    ) -> PipelineResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        if let Some(hit) = self.read_cache::<T>(operation, &key).await {
            self.record_request(operation, "cache", "success");
            return Ok(hit);
        }

        let source = self.mode().as_str();
        let value = match compute().await {
            Ok(value) => value,
            Err(e) => {
                debug!(operation, error = %e, kind = e.kind(), "Pipeline request failed");
                self.record_request(operation, source, e.kind());
                return Err(e);
            }
        };
        self.record_request(operation, source, "success");

        self.write_cache(operation, &key, &value, ttl).await;
        Ok(value)
    }

    async fn read_cache<T: DeserializeOwned>(&self, operation: &'static str, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    debug!(operation, key, "Cache hit");
                    self.record_cache(operation, "hit");
                    Some(value)
                }
                Err(e) => {
                    warn!(operation, key, error = %e, "Discarding unreadable cache entry");
                    self.record_cache(operation, "corrupt");
                    None
                }
            },
            Ok(None) => {
                debug!(operation, key, "Cache miss");
                self.record_cache(operation, "miss");
                None
            }
            Err(e) => {
                warn!(operation, key, error = %e, "Cache read failed, treating as miss");
                self.record_cache(operation, "error");
                None
            }
        }
    }

    async fn write_cache<T: Serialize>(&self, operation: &'static str, key: &str, value: &T, ttl: Duration) {
        let payload = match serde_json::to_vec(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(operation, error = %e, "Could not encode result for caching");
                self.record_cache(operation, "write_error");
                return;
            }
        };

        match self.cache.set(key, payload, ttl).await {
            Ok(()) => self.record_cache(operation, "write"),
            Err(e) => {
                warn!(operation, key, error = %e, "Cache write failed, result not cached");
                self.record_cache(operation, "write_error");
            }
        }
    }

    fn record_cache(&self, operation: &str, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_cache(operation, outcome);
        }
    }

    fn record_request(&self, operation: &str, source: &str, result: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_request(operation, source, result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CacheError, CacheResult};
    use crate::models::{Coordinates, Pollutant, ResolvedLocation};
    use crate::services::cache::{MemoryCache, NoopCache};
    use crate::services::normalizer::{RawLocation, RawMeasurement};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeResolver {
        calls: AtomicUsize,
        failure: Option<AirQualityError>,
    }

    #[async_trait]
    impl LocationResolver for FakeResolver {
        async fn resolve(&self, text: &str) -> PipelineResult<ResolvedLocation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = &self.failure {
                return Err(err.clone());
            }
            Ok(ResolvedLocation {
                display_name: format!("{text}, Testland"),
                lat: 40.7128,
                lon: -74.006,
            })
        }
    }

    #[derive(Default)]
    struct FakeProvider {
        measurement_calls: AtomicUsize,
        ranking_calls: AtomicUsize,
        last_request: Mutex<Option<(Coordinates, u32)>>,
        failure: Option<AirQualityError>,
    }

    #[async_trait]
    impl MeasurementProvider for FakeProvider {
        async fn fetch_measurements(
            &self,
            coordinates: Coordinates,
            radius_meters: u32,
        ) -> PipelineResult<Vec<RawMeasurement>> {
            self.measurement_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some((coordinates, radius_meters));
            if let Some(err) = &self.failure {
                return Err(err.clone());
            }
            Ok(serde_json::from_value(json!([
                {"parameter": "pm25", "value": 12.345678901234567, "unit": "µg/m³",
                 "date": {"utc": "2024-03-01T12:00:00.123456789Z"}, "location": "Station A"},
                {"parameter": "no2", "value": null, "unit": "ppm", "location": "Station B"},
                {"parameter": "o3", "value": "0.031", "unit": "ppm", "location": "Station C"}
            ]))
            .unwrap())
        }

        async fn fetch_rankings(
            &self,
            _parameter: Pollutant,
            _limit: u32,
        ) -> PipelineResult<Vec<RawLocation>> {
            self.ranking_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = &self.failure {
                return Err(err.clone());
            }
            Ok(serde_json::from_value(json!([
                {"city": "A", "country": "XA", "parameters": [{"parameter": "pm25", "average": 40, "unit": "µg/m³"}]},
                {"city": "B", "country": "XB", "parameters": [{"parameter": "pm25", "average": 10, "unit": "µg/m³"}]},
                {"city": "C", "country": "XC", "parameters": [{"parameter": "pm10", "average": 70, "unit": "µg/m³"}]},
                {"city": "D", "country": "XD", "parameters": [{"parameter": "pm25", "average": 25, "unit": "µg/m³"}]}
            ]))
            .unwrap())
        }
    }

    struct FailingCache;

    #[async_trait]
    impl ResultCache for FailingCache {
        async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> CacheResult<()> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        fn backend(&self) -> &'static str {
            "failing"
        }
    }

    fn live_service(
        resolver: Arc<FakeResolver>,
        provider: Arc<FakeProvider>,
        cache: Arc<dyn ResultCache>,
    ) -> AirQualityService {
        AirQualityService::live(resolver, provider, cache, CacheConfig::default())
    }

    #[tokio::test]
    async fn test_blank_location_never_reaches_providers() {
        let resolver = Arc::new(FakeResolver::default());
        let provider = Arc::new(FakeProvider::default());
        let service = live_service(resolver.clone(), provider.clone(), Arc::new(MemoryCache::new()));

        for input in ["", "   ", "\t"] {
            let err = service.get_air_quality(input, None).await.unwrap_err();
            assert!(matches!(err, AirQualityError::InvalidInput(_)));
        }
        let err = service.get_air_quality("Paris", Some(50)).await.unwrap_err();
        assert!(matches!(err, AirQualityError::InvalidInput(_)));

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        assert_eq!(provider.measurement_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_live_air_quality_flow() {
        let resolver = Arc::new(FakeResolver::default());
        let provider = Arc::new(FakeProvider::default());
        let service = live_service(resolver.clone(), provider.clone(), Arc::new(NoopCache));

        let result = service.get_air_quality(" New York ", Some(5_000)).await.unwrap();
        assert_eq!(result.location, "New York, Testland");
        assert_eq!(result.coordinates, Coordinates { lat: 40.7128, lon: -74.006 });
        assert_eq!(result.measurements.len(), 2);
        assert!(result.measurements.iter().all(|m| m.value.is_finite()));

        let (coords, radius) = provider.last_request.lock().unwrap().unwrap();
        assert_eq!(coords.lat, 40.7128);
        assert_eq!(radius, 5_000);
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let resolver = Arc::new(FakeResolver::default());
        let provider = Arc::new(FakeProvider::default());
        let service = live_service(resolver.clone(), provider.clone(), Arc::new(MemoryCache::new()));

        let first = service.get_air_quality("Berlin", None).await.unwrap();
        let second = service.get_air_quality("  berlin ", None).await.unwrap();

        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.measurement_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_cache_is_fail_open() {
        let resolver = Arc::new(FakeResolver::default());
        let provider = Arc::new(FakeProvider::default());
        let service = live_service(resolver.clone(), provider.clone(), Arc::new(FailingCache));

        assert!(service.get_air_quality("Berlin", None).await.is_ok());
        assert!(service.get_air_quality("Berlin", None).await.is_ok());
        assert_eq!(provider.measurement_calls.load(Ordering::SeqCst), 2);

        let rankings = service.get_city_rankings(None, None).await.unwrap();
        assert_eq!(rankings.len(), 3);
    }

    #[tokio::test]
    async fn test_errors_pass_through_and_are_not_cached() {
        let resolver = Arc::new(FakeResolver {
            failure: Some(AirQualityError::RateLimited("slow down".into())),
            ..FakeResolver::default()
        });
        let provider = Arc::new(FakeProvider::default());
        let service = live_service(resolver.clone(), provider.clone(), Arc::new(MemoryCache::new()));

        for _ in 0..2 {
            let err = service.get_air_quality("Paris", None).await.unwrap_err();
            assert_eq!(err, AirQualityError::RateLimited("slow down".into()));
        }
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
        assert_eq!(provider.measurement_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_provider_not_found_surfaces() {
        let provider = Arc::new(FakeProvider {
            failure: Some(AirQualityError::not_found("No ranking data available")),
            ..FakeProvider::default()
        });
        let service = live_service(
            Arc::new(FakeResolver::default()),
            provider.clone(),
            Arc::new(NoopCache),
        );

        let err = service.get_city_rankings(Some("no2"), Some(20)).await.unwrap_err();
        assert!(matches!(err, AirQualityError::NotFound(_)));
        assert_eq!(provider.ranking_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rankings_keep_provider_order() {
        let provider = Arc::new(FakeProvider::default());
        let service = live_service(
            Arc::new(FakeResolver::default()),
            provider.clone(),
            Arc::new(MemoryCache::new()),
        );

        let rankings = service.get_city_rankings(Some("pm25"), Some(10)).await.unwrap();
        let cities: Vec<&str> = rankings.iter().map(|r| r.city.as_str()).collect();
        assert_eq!(cities, vec!["A", "B", "D"]);

        service.get_city_rankings(None, None).await.unwrap();
        assert_eq!(provider.ranking_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_ranking_input() {
        let provider = Arc::new(FakeProvider::default());
        let service = live_service(
            Arc::new(FakeResolver::default()),
            provider.clone(),
            Arc::new(NoopCache),
        );

        for (parameter, limit) in [(Some("smog"), None), (None, Some(4)), (None, Some(101))] {
            let err = service.get_city_rankings(parameter, limit).await.unwrap_err();
            assert!(matches!(err, AirQualityError::InvalidInput(_)));
        }
        assert_eq!(provider.ranking_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_mock_mode_serves_synthetic_data() {
        let service = AirQualityService::mock(Arc::new(NoopCache), CacheConfig::default());
        assert_eq!(service.mode(), ProviderMode::Mock);

        let result = service.get_air_quality("Anywhere", None).await.unwrap();
        assert_eq!(result.location, "Sample City");

        let rankings = service.get_city_rankings(Some("o3"), Some(50)).await.unwrap();
        assert_eq!(rankings.len(), mock_source::MOCK_RANKING_COUNT);

        let err = service.get_air_quality("  ", None).await.unwrap_err();
        assert!(matches!(err, AirQualityError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_unreadable_cache_entry_is_a_miss() {
        let cache = Arc::new(MemoryCache::new());
        let config = CacheConfig::default();
        let query = LocationQuery::new("Berlin", None).unwrap();
        cache
            .set(
                &keys::air_quality(&config.key_prefix, &query),
                b"{not json".to_vec(),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let provider = Arc::new(FakeProvider::default());
        let service = live_service(Arc::new(FakeResolver::default()), provider.clone(), cache);
        assert!(service.get_air_quality("Berlin", None).await.is_ok());
        assert_eq!(provider.measurement_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_metrics_record_cache_outcomes() {
        let app_metrics = AppMetrics::new(&crate::config::MetricsConfig::default()).unwrap();
        let service = AirQualityService::mock(Arc::new(MemoryCache::new()), CacheConfig::default())
            .with_metrics(app_metrics.pipeline.clone());

        service.get_air_quality("Berlin", None).await.unwrap();
        service.get_air_quality("Berlin", None).await.unwrap();

        let cache = &app_metrics.pipeline.cache_operations_total;
        assert_eq!(cache.with_label_values(&["air-quality", "miss"]).get(), 1.0);
        assert_eq!(cache.with_label_values(&["air-quality", "hit"]).get(), 1.0);
        assert_eq!(cache.with_label_values(&["air-quality", "write"]).get(), 1.0);
    }
}
