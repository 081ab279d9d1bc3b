//! Health check endpoint handler.

use crate::{models::HealthResponse, services::AirQualityService};
use actix_web::{Error, HttpRequest, Result, web};
use paperclip::actix::api_v2_operation;

/// Health check endpoint
///
/// Reports liveness plus the provider mode and cache backend chosen at
/// startup. A cache outage does not make the service unhealthy.
#[api_v2_operation(
    summary = "Health Check Endpoint",
    description = "Returns the current health status of the API, the provider mode (live or mock) and the result cache backend.",
    tags("Health"),
    responses(
        (status = 200, description = "Successful response", body = HealthResponse)
    )
)]
pub async fn health(req: HttpRequest) -> Result<web::Json<HealthResponse>, Error> {
    let (provider_mode, cache) = match req.app_data::<web::Data<AirQualityService>>() {
        Some(service) => (service.mode().to_string(), service.cache_backend().to_string()),
        None => ("unconfigured".to_string(), "none".to_string()),
    };

    Ok(web::Json(HealthResponse {
        status: "healthy".to_string(),
        provider_mode,
        cache,
    }))
}
