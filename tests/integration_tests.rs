use actix_web::{http::StatusCode, test};
use ecotrack_api::{AppState, create_app};
use serde_json::Value;

async fn get_json(uri: &str) -> (StatusCode, Value) {
    let app = test::init_service(create_app(AppState::mock().unwrap())).await;
    let req = test::TestRequest::get().uri(uri).to_request();
    let resp = test::call_service(&app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    let json = serde_json::from_slice(&body)
        .unwrap_or_else(|e| panic!("{uri} returned non-JSON body ({e}): {body:?}"));
    (status, json)
}

/// Integration test for the health check endpoint
///
/// Uses the full app setup, so it also covers the middleware stack and the
/// mode selected by the default configuration.
#[actix_web::test]
async fn test_health_endpoint_integration() {
    let (status, json) = get_json("/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        serde_json::json!({
            "status": "healthy",
            "provider_mode": "mock",
            "cache": "memory"
        })
    );
}

#[actix_web::test]
async fn test_version_endpoint_integration() {
    let (status, json) = get_json("/api/version").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert!(json["commit"].is_string(), "commit should be a string");
    assert!(json["build_time"].is_string(), "build_time should be a string");
}

#[actix_web::test]
async fn test_request_id_header_is_returned() {
    let app = test::init_service(create_app(AppState::mock().unwrap())).await;
    let req = test::TestRequest::get()
        .uri("/api/health")
        .insert_header(("X-Request-ID", "req-42"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.headers().get("x-request-id").unwrap(), "req-42");
}

#[actix_web::test]
async fn test_mock_air_quality_shape() {
    let (status, json) = get_json("/api/data/air-quality?location=Berlin").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");
    let data = &json["data"];
    assert_eq!(data["location"], "Sample City");
    assert_eq!(data["coordinates"]["lat"], 40.7128);
    assert_eq!(data["coordinates"]["lon"], -74.006);

    let measurements = data["measurements"].as_array().unwrap();
    assert_eq!(measurements.len(), 1);
    assert_eq!(measurements[0]["parameter"], "pm25");
    assert_eq!(measurements[0]["value"], 15.0);
    assert_eq!(measurements[0]["stationLabel"], "Sample Station 1");
    assert!(measurements[0]["observedAt"].is_string());
}

#[actix_web::test]
async fn test_mock_city_rankings_shape() {
    let (status, json) = get_json("/api/data/city-rankings?parameter=no2&limit=20").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "success");
    let rankings = json["data"]["rankings"].as_array().unwrap();
    assert_eq!(rankings.len(), 10);
    assert_eq!(rankings[0]["city"], "City 1");
    assert_eq!(rankings[0]["country"], "Sample Country");
    assert!(rankings[0]["coordinates"].is_null());

    let values: Vec<f64> = rankings.iter().map(|r| r["value"].as_f64().unwrap()).collect();
    assert!(values.iter().all(|v| (0.0..50.0).contains(v)));
}

#[actix_web::test]
async fn test_missing_location_is_bad_request() {
    for uri in [
        "/api/data/air-quality",
        "/api/data/air-quality?location=",
        "/api/data/air-quality?location=%20%20",
    ] {
        let (status, json) = get_json(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json["status"], "fail");
        assert!(json["message"].as_str().unwrap().contains("location"));
    }
}

#[actix_web::test]
async fn test_invalid_radius_is_bad_request() {
    for uri in [
        "/api/data/air-quality?location=Berlin&radius=999",
        "/api/data/air-quality?location=Berlin&radius=100001",
        "/api/data/air-quality?location=Berlin&radius=far",
        "/api/data/air-quality?location=Berlin&bogus=1",
    ] {
        let (status, json) = get_json(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json["status"], "fail");
    }
}

#[actix_web::test]
async fn test_invalid_ranking_query_is_bad_request() {
    for uri in [
        "/api/data/city-rankings?parameter=smog",
        "/api/data/city-rankings?parameter=NO2",
        "/api/data/city-rankings?limit=4",
        "/api/data/city-rankings?limit=101",
        "/api/data/city-rankings?limit=ten",
        "/api/data/city-rankings?parameter=pm25&bogus=1",
    ] {
        let (status, json) = get_json(uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(json["status"], "fail");
    }
}

#[actix_web::test]
async fn test_metrics_endpoint_reports_pipeline_activity() {
    let app = test::init_service(create_app(AppState::mock().unwrap())).await;

    for _ in 0..2 {
        let req = test::TestRequest::get()
            .uri("/api/data/air-quality?location=Berlin")
            .to_request();
        assert!(test::call_service(&app, req).await.status().is_success());
    }

    let req = test::TestRequest::get().uri("/api/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = test::read_body(resp).await;
    let text = std::str::from_utf8(&body).unwrap();
    assert!(text.contains("ecotrack_http_requests_total"));
    assert!(text.contains(r#"ecotrack_cache_operations_total{operation="air-quality",outcome="hit"} 1"#));
    assert!(text.contains(r#"ecotrack_cache_operations_total{operation="air-quality",outcome="miss"} 1"#));
}

#[actix_web::test]
async fn test_openapi_spec_lists_data_endpoints() {
    let (status, json) = get_json("/api/spec/v2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["info"]["title"], "EcoTrack Data API");
    let paths = json["paths"].as_object().unwrap();
    assert!(paths.contains_key("/api/data/air-quality"));
    assert!(paths.contains_key("/api/data/city-rankings"));
    assert!(paths.contains_key("/api/health"));
}
