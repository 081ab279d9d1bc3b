//! Location resolution through the Nominatim geocoding service.

use crate::error::{AirQualityError, PipelineResult, UpstreamError};
use crate::models::ResolvedLocation;
use crate::services::normalizer::{RawPlace, resolve_place};
use crate::services::upstream_client::UpstreamClient;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;
use url::Url;

/// Turns free-text place names into coordinates.
#[async_trait]
pub trait LocationResolver: Send + Sync {
    /// Resolve `text` (already validated non-blank) to its best match.
    async fn resolve(&self, text: &str) -> PipelineResult<ResolvedLocation>;
}

/// Geocoder backed by a Nominatim `/search` endpoint.
pub struct NominatimResolver {
    client: UpstreamClient,
    search_url: Url,
    user_agent: HeaderValue,
}

impl NominatimResolver {
    pub fn new(client: UpstreamClient, base_url: &str, user_agent: &str) -> PipelineResult<Self> {
        let search_url = Url::parse(&format!("{}/search", base_url.trim_end_matches('/')))
            .map_err(|e| AirQualityError::Internal(format!("Invalid geocoder URL: {e}")))?;
        let user_agent = HeaderValue::from_str(user_agent)
            .map_err(|e| AirQualityError::Internal(format!("Invalid geocoder user agent: {e}")))?;

        Ok(Self {
            client,
            search_url,
            user_agent,
        })
    }

    fn search_url(&self, text: &str) -> Url {
        let mut url = self.search_url.clone();
        url.query_pairs_mut()
            .append_pair("q", text)
            .append_pair("format", "json")
            .append_pair("limit", "1");
        url
    }
}

#[async_trait]
impl LocationResolver for NominatimResolver {
    async fn resolve(&self, text: &str) -> PipelineResult<ResolvedLocation> {
        debug!(location = %text, "Geocoding location");

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, self.user_agent.clone());

        let places: Vec<RawPlace> = self
            .client
            .get_json(self.search_url(text), headers)
            .await
            .map_err(classify_geocoding_error)?;

        let resolved = resolve_place(places)?;
        debug!(
            location = %text,
            display_name = %resolved.display_name,
            lat = resolved.lat,
            lon = resolved.lon,
            "Resolved location"
        );
        Ok(resolved)
    }
}

fn classify_geocoding_error(error: UpstreamError) -> AirQualityError {
    match error {
        UpstreamError::RateLimited => AirQualityError::RateLimited(
            "Location search rate limit exceeded, please try again later".into(),
        ),
        other => {
            tracing::warn!(error = %other, "Geocoding request failed");
            AirQualityError::UpstreamUnavailable("Failed to geocode location".into())
        }
    }
}
