//! Tracing subscriber setup and request log fields.

use crate::config::{LogFormat, LoggingConfig};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. `RUST_LOG` wins over the configured filter.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_filter))?;

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init()?,
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init()?,
    }

    info!(
        service_name = %config.service_name,
        service_version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        "Logging initialized"
    );
    Ok(())
}

/// Request attributes attached to the request log lines.
pub struct RequestFields {
    pub method: String,
    pub path: String,
    pub ip_address: String,
    pub user_agent: Option<String>,
}

impl RequestFields {
    pub fn from_request(req: &actix_web::HttpRequest) -> Self {
        Self {
            method: req.method().to_string(),
            path: req.path().to_string(),
            ip_address: req
                .connection_info()
                .realip_remote_addr()
                .unwrap_or("unknown")
                .to_string(),
            user_agent: req
                .headers()
                .get(actix_web::http::header::USER_AGENT)
                .and_then(|h| h.to_str().ok())
                .map(|s| s.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_request_fields() {
        let req = TestRequest::get()
            .uri("/api/data/air-quality?location=Berlin")
            .insert_header(("User-Agent", "curl/8.0"))
            .insert_header(("X-Forwarded-For", "203.0.113.7"))
            .to_http_request();

        let fields = RequestFields::from_request(&req);
        assert_eq!(fields.method, "GET");
        assert_eq!(fields.path, "/api/data/air-quality");
        assert_eq!(fields.ip_address, "203.0.113.7");
        assert_eq!(fields.user_agent.as_deref(), Some("curl/8.0"));
    }

    #[test]
    fn test_request_fields_without_headers() {
        let req = TestRequest::get().uri("/api/health").to_http_request();
        let fields = RequestFields::from_request(&req);
        assert_eq!(fields.user_agent, None);
    }
}
