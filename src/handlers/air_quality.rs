//! Air-quality data endpoint handlers.
//!
//! Thin adapters: query parameters go to [`AirQualityService`] untouched and
//! every pipeline error is rendered through its `ResponseError` impl.

use crate::{
    error::AirQualityError,
    middleware::RequestId,
    models::{
        AirQualityParams, AirQualityResult, ApiResponse, CityRankingsData, CityRankingsParams,
    },
    services::AirQualityService,
};
use actix_web::{Error, HttpRequest, Result, web};
use paperclip::actix::api_v2_operation;
use tracing::{Instrument, Span};

fn pipeline(req: &HttpRequest) -> Result<&web::Data<AirQualityService>, AirQualityError> {
    req.app_data::<web::Data<AirQualityService>>()
        .ok_or_else(|| AirQualityError::Internal("Air quality service not configured".into()))
}

fn request_span(req: &HttpRequest, operation: &'static str) -> Span {
    let request_id = RequestId::of(req).unwrap_or_default();
    tracing::info_span!("pipeline", operation, request_id = %request_id)
}

/// Air quality endpoint
///
/// Geocodes `location` and returns the latest measurements within `radius`
/// meters of it.
#[api_v2_operation(
    summary = "Air Quality Endpoint",
    description = "Resolves a free-text location and returns the latest pollutant measurements from monitoring stations within the given radius (meters, 1000 to 100000, default 10000). Results are cached for five minutes.",
    tags("Air Quality"),
    responses(
        (status = 200, description = "Successful response", body = ApiResponse<AirQualityResult>),
        (status = 400, description = "Bad Request - Missing location or radius out of range"),
        (status = 404, description = "Not Found - Location unknown or no valid measurements"),
        (status = 429, description = "Too Many Requests - Upstream provider rate limit"),
        (status = 502, description = "Bad Gateway - Upstream provider unavailable")
    )
)]
pub async fn air_quality(
    req: HttpRequest,
    query: web::Query<AirQualityParams>,
) -> Result<web::Json<ApiResponse<AirQualityResult>>, Error> {
    let service = pipeline(&req)?;
    let params = query.into_inner();

    let result = service
        .get_air_quality(params.location.as_deref().unwrap_or_default(), params.radius)
        .instrument(request_span(&req, "air_quality"))
        .await?;

    Ok(web::Json(ApiResponse::success(result)))
}

/// City rankings endpoint
///
/// Lists locations by their average for one pollutant, in provider order.
#[api_v2_operation(
    summary = "City Rankings Endpoint",
    description = "Returns locations ranked by their average value for one pollutant (pm25, pm10, no2, so2, o3, co; default pm25). `limit` must be between 5 and 100 (default 10). Results are cached for fifteen minutes.",
    tags("Air Quality"),
    responses(
        (status = 200, description = "Successful response", body = ApiResponse<CityRankingsData>),
        (status = 400, description = "Bad Request - Unknown parameter or limit out of range"),
        (status = 404, description = "Not Found - No valid data for the parameter"),
        (status = 429, description = "Too Many Requests - Upstream provider rate limit"),
        (status = 502, description = "Bad Gateway - Upstream provider unavailable")
    )
)]
pub async fn city_rankings(
    req: HttpRequest,
    query: web::Query<CityRankingsParams>,
) -> Result<web::Json<ApiResponse<CityRankingsData>>, Error> {
    let service = pipeline(&req)?;
    let params = query.into_inner();

    let rankings = service
        .get_city_rankings(params.parameter.as_deref(), params.limit)
        .instrument(request_span(&req, "city_rankings"))
        .await?;

    Ok(web::Json(ApiResponse::success(CityRankingsData { rankings })))
}

/// Map query-string deserialization failures onto the error envelope.
pub fn query_error_handler(
    err: actix_web::error::QueryPayloadError,
    _req: &HttpRequest,
) -> Error {
    AirQualityError::invalid_input(format!("Invalid query string: {err}")).into()
}
