//! Metrics collection and Prometheus integration service.

use crate::config::MetricsConfig;
use crate::services::upstream_client::UpstreamMetrics;
use prometheus::{CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::time::{Duration, Instant};

/// Application metrics collector for Prometheus integration
#[derive(Clone)]
pub struct AppMetrics {
    pub registry: Registry,
    pub http_requests_total: CounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub app_uptime_seconds: Gauge,
    pub app_info: CounterVec,
    pub pipeline: PipelineMetrics,
    pub upstream: UpstreamMetrics,
    pub start_time: Instant,
}

/// Counters for the aggregation pipeline itself.
#[derive(Clone)]
pub struct PipelineMetrics {
    /// Cache reads and writes by operation and outcome (hit, miss, error, write)
    pub cache_operations_total: CounterVec,
    /// Completed pipeline requests by operation, source (cache, live, mock) and result
    pub requests_total: CounterVec,
}

impl PipelineMetrics {
    pub fn new(registry: &Registry, namespace: &str) -> Result<Self, prometheus::Error> {
        let cache_operations_total = CounterVec::new(
            Opts::new("cache_operations_total", "Result cache operations by outcome")
                .namespace(namespace.to_string()),
            &["operation", "outcome"],
        )?;
        let requests_total = CounterVec::new(
            Opts::new("pipeline_requests_total", "Pipeline requests by source and result")
                .namespace(namespace.to_string()),
            &["operation", "source", "result"],
        )?;

        registry.register(Box::new(cache_operations_total.clone()))?;
        registry.register(Box::new(requests_total.clone()))?;

        Ok(Self {
            cache_operations_total,
            requests_total,
        })
    }

    pub fn record_cache(&self, operation: &str, outcome: &str) {
        self.cache_operations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn record_request(&self, operation: &str, source: &str, result: &str) {
        self.requests_total
            .with_label_values(&[operation, source, result])
            .inc();
    }
}

impl AppMetrics {
    /// Create a new metrics collector with default Prometheus metrics
    pub fn new(config: &MetricsConfig) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let namespace = config.namespace.as_str();

        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests")
                .namespace(namespace.to_string()),
            &["method", "status", "route"],
        )?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .namespace(namespace.to_string())
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "route"],
        )?;

        let app_uptime_seconds = Gauge::with_opts(
            Opts::new("app_uptime_seconds", "Application uptime in seconds")
                .namespace(namespace.to_string()),
        )?;

        let app_info = CounterVec::new(
            Opts::new("app_info", "Application information").namespace(namespace.to_string()),
            &["version", "commit", "build_time"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(app_uptime_seconds.clone()))?;
        registry.register(Box::new(app_info.clone()))?;

        let pipeline = PipelineMetrics::new(&registry, namespace)?;
        let upstream = UpstreamMetrics::new(&registry, namespace)?;

        let build = crate::handlers::version::build_info();
        app_info
            .with_label_values(&[
                build.version.as_str(),
                build.commit.as_str(),
                build.build_time.as_str(),
            ])
            .inc();

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            app_uptime_seconds,
            app_info,
            pipeline,
            upstream,
            start_time: Instant::now(),
        })
    }

    /// Record an HTTP request with method, route, status, and duration
    pub fn record_request(&self, method: &str, route: &str, status: u16, duration: Duration) {
        if route == "/api/metrics" {
            // Scrapes would otherwise dominate the counters.
            return;
        }

        self.http_requests_total
            .with_label_values(&[method, &status.to_string(), route])
            .inc();

        self.http_request_duration_seconds
            .with_label_values(&[method, route])
            .observe(duration.as_secs_f64());
    }

    /// Update the application uptime gauge
    pub fn update_uptime(&self) {
        let uptime = self.start_time.elapsed().as_secs_f64();
        self.app_uptime_seconds.set(uptime);
    }

    /// Render metrics in Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode_to_string(&metric_families)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_namespaced_metrics() {
        let metrics = AppMetrics::new(&MetricsConfig::default()).unwrap();
        metrics.record_request("GET", "/api/data/air-quality", 200, Duration::from_millis(12));
        metrics.pipeline.record_cache("air-quality", "hit");
        metrics.update_uptime();

        let output = metrics.render().unwrap();
        assert!(output.contains("ecotrack_http_requests_total"));
        assert!(output.contains("ecotrack_cache_operations_total"));
        assert!(output.contains("ecotrack_app_uptime_seconds"));
    }

    #[test]
    fn test_metrics_route_is_not_recorded() {
        let metrics = AppMetrics::new(&MetricsConfig::default()).unwrap();
        metrics.record_request("GET", "/api/metrics", 200, Duration::from_millis(1));
        let count = metrics
            .http_requests_total
            .with_label_values(&["GET", "200", "/api/metrics"])
            .get();
        assert_eq!(count, 0.0);
    }
}
