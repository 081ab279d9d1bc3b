//! Error taxonomy for the air-quality pipeline.
//!
//! Every failure a caller can observe is one of the five [`AirQualityError`]
//! variants. Transport-level failures from the upstream HTTP client and cache
//! store failures have their own types and are classified (or absorbed) before
//! they reach a caller.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;

/// Result alias used throughout the pipeline.
pub type PipelineResult<T> = Result<T, AirQualityError>;

/// Failures surfaced to callers of the air-quality operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AirQualityError {
    /// Missing or out-of-range parameter.
    #[error("{0}")]
    InvalidInput(String),

    /// Geocoding or the measurement provider produced zero usable results.
    #[error("{0}")]
    NotFound(String),

    /// An upstream provider throttled the request.
    #[error("{0}")]
    RateLimited(String),

    /// Transport failure, timeout, or an unexpected upstream response.
    #[error("{0}")]
    UpstreamUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl AirQualityError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Short machine-readable label, used for log fields and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::RateLimited(_) => "rate_limited",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::Internal(_) => "internal",
        }
    }
}

/// Error body, matching the `{status, message}` envelope of successful responses.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    status: &'static str,
    message: &'a str,
}

impl ResponseError for AirQualityError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = self.to_string();
        HttpResponse::build(status).json(ErrorBody {
            status: if status.is_client_error() { "fail" } else { "error" },
            message: &message,
        })
    }
}

/// Errors produced by the upstream HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Upstream rate limit reached")]
    RateLimited,

    #[error("Unexpected status code: {0}")]
    Status(u16),

    #[error("Malformed upstream response: {0}")]
    Decode(String),
}

/// Errors produced by a cache store. Never surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache store unavailable: {0}")]
    Unavailable(String),

    #[error("Cache command failed: {0}")]
    Command(#[from] redis::RedisError),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Failures while assembling the service at startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Pipeline setup failed: {0}")]
    Pipeline(#[from] AirQualityError),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AirQualityError::invalid_input("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AirQualityError::not_found("x").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AirQualityError::RateLimited("x".into()).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AirQualityError::UpstreamUnavailable("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AirQualityError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rate_limited_is_distinct_from_unavailable() {
        let limited = AirQualityError::RateLimited("slow down".into());
        let unavailable = AirQualityError::UpstreamUnavailable("down".into());
        assert_ne!(limited.kind(), unavailable.kind());
        assert_ne!(limited.status_code(), unavailable.status_code());
    }

    #[actix_web::test]
    async fn test_error_envelope() {
        let resp = AirQualityError::not_found("Location not found").error_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "fail");
        assert_eq!(json["message"], "Location not found");

        let resp = AirQualityError::UpstreamUnavailable("down".into()).error_response();
        let body = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "error");
    }
}
