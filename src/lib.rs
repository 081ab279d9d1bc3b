//! EcoTrack API - air-quality data aggregation service
//!
//! Resolves free-text locations through a geocoding service, fetches nearby
//! pollutant measurements and city rankings from a measurement provider,
//! normalizes both into one schema, and caches results with fail-open
//! semantics. Without a provider key the same schema is served from a
//! synthetic mock source.
//!
//! ## Architecture
//!
//! - `models/` - Normalized schema, validated queries, HTTP shapes
//! - `services/` - Provider clients, normalizer, cache, and the aggregation pipeline
//! - `handlers/` - HTTP request handlers and the app factory
//! - `middleware/` - Request IDs and metrics collection
//! - `config/` - Configuration structures and environment loading
//! - `error` - Error taxonomy and its HTTP mapping
//! - `logging` - Tracing subscriber setup
//!
//! ## Quick Start
//!
//! ```no_run
//! use ecotrack_api::AirQualityService;
//! use ecotrack_api::config::CacheConfig;
//! use ecotrack_api::services::MemoryCache;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = AirQualityService::mock(Arc::new(MemoryCache::new()), CacheConfig::default());
//!     let result = service.get_air_quality("Berlin", None).await;
//!     println!("{result:?}");
//! }
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::{AppConfig, CacheConfig, LoggingConfig, MetricsConfig, ProviderMode};
pub use error::{AirQualityError, PipelineResult, StartupError};
pub use handlers::{AppState, create_app, create_openapi_spec};
pub use middleware::{MetricsMiddleware, RequestIdMiddleware};
pub use models::{
    AirQualityResult, CityRanking, Coordinates, LocationQuery, Measurement, Pollutant,
    RankingQuery, ResolvedLocation,
};
pub use services::{AirQualityService, AppMetrics, ResultCache, build_cache};
