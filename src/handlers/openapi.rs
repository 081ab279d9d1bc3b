//! OpenAPI specification generation and app factory.

use crate::{
    config::{AppConfig, MetricsConfig},
    error::StartupError,
    handlers::{air_quality, city_rankings, get_metrics, health, query_error_handler, version},
    middleware::{MetricsMiddleware, RequestIdMiddleware},
    services::{AirQualityService, AppMetrics, MemoryCache, ResultCache},
};
use actix_web::App;
use paperclip::actix::{OpenApiExt, web};
use paperclip::v2::models::{DefaultApiRaw, Info};
use std::sync::Arc;

/// Creates the shared OpenAPI specification for the API
pub fn create_openapi_spec() -> DefaultApiRaw {
    DefaultApiRaw {
        info: Info {
            title: "EcoTrack Data API".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            description: Some(
                "Air-quality measurements and city pollutant rankings aggregated from a geocoding service and a measurement provider.\n\n\
                ## Response envelope\n\
                Successful responses are wrapped as `{\"status\": \"success\", \"data\": ...}`.\n\
                Failures use `{\"status\": \"fail\" | \"error\", \"message\": \"...\"}` where `fail` marks a client error (4xx).\n\
                \n\
                ## Status codes\n\
                - `400`: missing or out-of-range parameter\n\
                - `404`: unknown location or no valid data\n\
                - `429`: an upstream provider throttled the request; retry later\n\
                - `502`: an upstream provider failed or timed out\n\
                \n\
                ## Caching\n\
                Air-quality results are cached for 5 minutes and rankings for 15 minutes.\n\
                Cache outages never fail a request.\n\
                \n\
                ## Mock mode\n\
                Without a provider API key the service returns synthetic data with the same schema; `/api/health` reports the active mode.".into()
            ),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Shared state handed to every worker.
#[derive(Clone)]
pub struct AppState {
    pub service: actix_web::web::Data<AirQualityService>,
    pub metrics: actix_web::web::Data<AppMetrics>,
    pub metrics_config: actix_web::web::Data<MetricsConfig>,
}

impl AppState {
    /// Build metrics and the pipeline for `config` on top of `cache`.
    pub fn from_config(
        config: &AppConfig,
        cache: Arc<dyn ResultCache>,
    ) -> Result<Self, StartupError> {
        let metrics = AppMetrics::new(&config.metrics)?;
        let service = AirQualityService::from_config(config, cache, Some(&metrics))?;

        Ok(Self {
            service: actix_web::web::Data::new(service),
            metrics: actix_web::web::Data::new(metrics),
            metrics_config: actix_web::web::Data::new(config.metrics.clone()),
        })
    }

    /// Mock-mode state with an in-process cache, for tests and local runs.
    pub fn mock() -> Result<Self, StartupError> {
        Self::from_config(&AppConfig::mock(), Arc::new(MemoryCache::new()))
    }
}

/// Creates the application with all routes, middleware and the OpenAPI spec
///
/// Used by `main` for every worker and by the integration tests.
pub fn create_app(
    state: AppState,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let query_config = actix_web::web::QueryConfig::default().error_handler(query_error_handler);

    App::new()
        .wrap(RequestIdMiddleware)
        .wrap(MetricsMiddleware)
        .wrap_api_with_spec(create_openapi_spec())
        .app_data(query_config)
        .app_data(state.service)
        .app_data(state.metrics)
        .app_data(state.metrics_config)
        .service(web::resource("/api/health").route(web::get().to(health)))
        .service(web::resource("/api/version").route(web::get().to(version)))
        .service(web::resource("/api/metrics").route(web::get().to(get_metrics)))
        .service(web::resource("/api/data/air-quality").route(web::get().to(air_quality)))
        .service(web::resource("/api/data/city-rankings").route(web::get().to(city_rankings)))
        .with_json_spec_at("/api/spec/v2")
        .build()
}
