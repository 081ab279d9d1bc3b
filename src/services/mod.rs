//! Business logic and service layer modules.
//!
//! Provider clients, payload normalization, the result cache, and the
//! aggregation pipeline that composes them, plus metrics collection.

pub mod air_quality;
pub mod cache;
pub mod geocoding;
pub mod measurements;
pub mod metrics;
pub mod mock_source;
pub mod normalizer;
pub mod upstream_client;

pub use air_quality::AirQualityService;
pub use cache::{MemoryCache, NoopCache, RedisCache, ResultCache, build_cache};
pub use geocoding::{LocationResolver, NominatimResolver};
pub use measurements::{MeasurementProvider, OpenAqClient};
pub use metrics::*;
pub use upstream_client::{UpstreamClient, UpstreamClientConfig, UpstreamMetrics};
