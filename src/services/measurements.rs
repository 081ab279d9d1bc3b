//! Measurement and ranking retrieval from the OpenAQ API.

use crate::error::{AirQualityError, PipelineResult, UpstreamError};
use crate::models::{Coordinates, Pollutant};
use crate::services::normalizer::{ProviderPage, RawLocation, RawMeasurement};
use crate::services::upstream_client::UpstreamClient;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

/// Most recent measurements requested per lookup.
pub const MEASUREMENT_LIMIT: u32 = 100;

const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

/// Source of raw measurement and ranking records.
#[async_trait]
pub trait MeasurementProvider: Send + Sync {
    /// Up to [`MEASUREMENT_LIMIT`] most recent records within `radius_meters`.
    async fn fetch_measurements(
        &self,
        coordinates: Coordinates,
        radius_meters: u32,
    ) -> PipelineResult<Vec<RawMeasurement>>;

    /// Up to `limit` locations ordered by descending average of `parameter`.
    async fn fetch_rankings(
        &self,
        parameter: Pollutant,
        limit: u32,
    ) -> PipelineResult<Vec<RawLocation>>;
}

/// OpenAQ v2 client.
pub struct OpenAqClient {
    client: UpstreamClient,
    base_url: Url,
    headers: HeaderMap,
}

impl OpenAqClient {
    pub fn new(client: UpstreamClient, base_url: &str, api_key: &str) -> PipelineResult<Self> {
        // A trailing slash keeps `join` from dropping the version segment.
        let base_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|e| AirQualityError::Internal(format!("Invalid measurement provider URL: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|e| AirQualityError::Internal(format!("Invalid API key: {e}")))?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);

        Ok(Self {
            client,
            base_url,
            headers,
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> PipelineResult<Url> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| AirQualityError::Internal(format!("Invalid endpoint {path}: {e}")))?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    async fn fetch_page<T: DeserializeOwned>(&self, url: Url) -> PipelineResult<Vec<T>> {
        let page: ProviderPage<T> = self
            .client
            .get_json(url, self.headers.clone())
            .await
            .map_err(classify_provider_error)?;
        Ok(page.results)
    }
}

#[async_trait]
impl MeasurementProvider for OpenAqClient {
    async fn fetch_measurements(
        &self,
        coordinates: Coordinates,
        radius_meters: u32,
    ) -> PipelineResult<Vec<RawMeasurement>> {
        let url = self.endpoint(
            "measurements",
            &[
                ("coordinates", format!("{},{}", coordinates.lat, coordinates.lon)),
                ("radius", radius_meters.to_string()),
                ("limit", MEASUREMENT_LIMIT.to_string()),
                ("order_by", "datetime".to_string()),
                ("sort", "desc".to_string()),
            ],
        )?;

        let records: Vec<RawMeasurement> = self.fetch_page(url).await?;
        debug!(
            lat = coordinates.lat,
            lon = coordinates.lon,
            radius_meters,
            records = records.len(),
            "Fetched measurements"
        );

        if records.is_empty() {
            return Err(AirQualityError::not_found(
                "No air quality data available for this location",
            ));
        }
        Ok(records)
    }

    async fn fetch_rankings(
        &self,
        parameter: Pollutant,
        limit: u32,
    ) -> PipelineResult<Vec<RawLocation>> {
        let url = self.endpoint(
            "locations",
            &[
                ("parameter", parameter.as_str().to_string()),
                ("limit", limit.to_string()),
                ("order_by", "value".to_string()),
                ("sort", "desc".to_string()),
            ],
        )?;

        let records: Vec<RawLocation> = self.fetch_page(url).await?;
        debug!(%parameter, limit, records = records.len(), "Fetched ranking locations");

        if records.is_empty() {
            return Err(AirQualityError::not_found("No ranking data available"));
        }
        Ok(records)
    }
}

fn classify_provider_error(error: UpstreamError) -> AirQualityError {
    match error {
        UpstreamError::RateLimited => {
            AirQualityError::RateLimited("Rate limit exceeded, please try again later".into())
        }
        other => {
            tracing::warn!(error = %other, "Measurement provider request failed");
            AirQualityError::UpstreamUnavailable("Failed to fetch air quality data".into())
        }
    }
}
