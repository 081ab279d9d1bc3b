//! Request and response models for the HTTP surface.

use crate::models::air_quality::CityRanking;
use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Serialize};

/// Response model for the health check endpoint
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct HealthResponse {
    pub status: String,
    /// `live` or `mock`
    pub provider_mode: String,
    /// Result cache backend: `redis`, `memory` or `none`
    pub cache: String,
}

/// Response model for the version information endpoint
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct VersionResponse {
    pub version: String,
    pub commit: String,
    pub build_time: String,
}

/// Query parameters for the air-quality endpoint
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
#[serde(deny_unknown_fields)]
pub struct AirQualityParams {
    /// Place name or address (e.g., "Berlin")
    pub location: Option<String>,
    /// Search radius in meters, 1000 to 100000 (default 10000)
    pub radius: Option<i64>,
}

/// Query parameters for the city-rankings endpoint
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
#[serde(deny_unknown_fields)]
pub struct CityRankingsParams {
    /// One of pm25, pm10, no2, so2, o3, co (default pm25)
    pub parameter: Option<String>,
    /// Number of cities to return, 5 to 100 (default 10)
    pub limit: Option<i64>,
}

/// Payload of the city-rankings endpoint
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct CityRankingsData {
    pub rankings: Vec<CityRanking>,
}

/// Success envelope shared by the data endpoints
#[derive(Clone, Serialize, Deserialize, Apiv2Schema)]
pub struct ApiResponse<T> {
    /// Always "success"; failures use the error envelope
    pub status: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            data,
        }
    }
}
