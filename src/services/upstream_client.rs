//! Shared HTTP client for the geocoding and measurement providers.
//!
//! Every call is a single attempt bounded by a hard timeout. Rate-limit
//! responses are reported as their own error so callers can back off; nothing
//! in here retries.

use crate::error::UpstreamError;
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use reqwest::{Client, header::HeaderMap};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

/// Configuration for the upstream HTTP client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamClientConfig {
    /// Hard budget for one provider call, connection included (in seconds)
    pub request_timeout_seconds: u64,

    /// Connection timeout (in seconds)
    pub connect_timeout_seconds: u64,

    /// Log every request outcome
    pub enable_detailed_logging: bool,
}

impl Default for UpstreamClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 10,
            connect_timeout_seconds: 3,
            enable_detailed_logging: true,
        }
    }
}

impl UpstreamClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Metrics for upstream provider calls
#[derive(Clone)]
pub struct UpstreamMetrics {
    /// Upstream requests by destination and outcome
    pub requests_total: CounterVec,

    /// Upstream request duration by destination
    pub request_duration_seconds: HistogramVec,
}

impl UpstreamMetrics {
    pub fn new(registry: &Registry, namespace: &str) -> Result<Self, prometheus::Error> {
        let requests_total = CounterVec::new(
            Opts::new(
                "upstream_requests_total",
                "Total provider requests by destination and outcome",
            )
            .namespace(namespace.to_string()),
            &["destination", "outcome"],
        )?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "upstream_request_duration_seconds",
                "Duration of provider requests",
            )
            .namespace(namespace.to_string())
            .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["destination"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        Ok(Self {
            requests_total,
            request_duration_seconds,
        })
    }
}

/// HTTP client shared by every request; safe to use concurrently through `&self`.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
    config: UpstreamClientConfig,
    metrics: Option<UpstreamMetrics>,
}

impl UpstreamClient {
    pub fn new(
        config: UpstreamClientConfig,
        metrics: Option<UpstreamMetrics>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config,
            metrics,
        })
    }

    /// GET `url` and decode a JSON body.
    ///
    /// 429 maps to [`UpstreamError::RateLimited`], any other non-2xx status to
    /// [`UpstreamError::Status`], and an exhausted time budget to
    /// [`UpstreamError::Timeout`].
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        headers: HeaderMap,
    ) -> Result<T, UpstreamError> {
        let destination = extract_destination(&url);
        let start = Instant::now();

        let result = self.execute(&url, headers).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(UpstreamError::RateLimited) => "rate_limited",
            Err(UpstreamError::Timeout) => "timeout",
            Err(UpstreamError::Status(_)) => "http_error",
            Err(UpstreamError::Decode(_)) => "decode_error",
            Err(UpstreamError::Network(_)) => "network_error",
        };
        self.record(&destination, outcome, start.elapsed());

        if self.config.enable_detailed_logging {
            match &result {
                Ok(_) => info!(
                    destination = %destination,
                    path = %url.path(),
                    duration_ms = start.elapsed().as_millis(),
                    "Provider request completed"
                ),
                Err(UpstreamError::RateLimited) => warn!(
                    destination = %destination,
                    path = %url.path(),
                    "Provider rate limit reached"
                ),
                Err(e) => error!(
                    destination = %destination,
                    path = %url.path(),
                    error = %e,
                    duration_ms = start.elapsed().as_millis(),
                    "Provider request failed"
                ),
            }
        }

        result
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        url: &Url,
        headers: HeaderMap,
    ) -> Result<T, UpstreamError> {
        let budget = self.config.request_timeout();
        let request = self.client.get(url.clone()).headers(headers);

        // The whole exchange, body included, shares one budget.
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(UpstreamError::RateLimited);
            }
            if !status.is_success() {
                return Err(UpstreamError::Status(status.as_u16()));
            }

            let bytes = response.bytes().await?;
            debug!(bytes = bytes.len(), "Provider response received");
            serde_json::from_slice::<T>(&bytes).map_err(|e| UpstreamError::Decode(e.to_string()))
        };

        match tokio::time::timeout(budget, exchange).await {
            Ok(Err(UpstreamError::Network(e))) if e.is_timeout() => Err(UpstreamError::Timeout),
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout),
        }
    }

    fn record(&self, destination: &str, outcome: &str, duration: Duration) {
        if let Some(metrics) = &self.metrics {
            metrics
                .requests_total
                .with_label_values(&[destination, outcome])
                .inc();
            metrics
                .request_duration_seconds
                .with_label_values(&[destination])
                .observe(duration.as_secs_f64());
        }
    }
}

/// Host name used to group metrics and log lines.
fn extract_destination(url: &Url) -> String {
    url.host_str().unwrap_or("unknown").to_string()
}
