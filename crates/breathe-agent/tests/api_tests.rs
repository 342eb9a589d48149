//! Integration tests for the agent API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use breathe_agent::api::{create_router, AppState};
use breathe_lib::{
    calibration::{CalibrationConfig, CalibrationEngine},
    health::{components, HealthRegistry},
    history::HistoryStore,
    models::MetricSample,
    observability::{AgentMetrics, StructuredLogger},
    observation::InMemoryObservations,
    predictor::{Coefficients, LinearModel, ModelRegistry},
    service::ForecastService,
    store::TimeSeriesStore,
};
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    state: Arc<AppState>,
}

/// Delhi has a persistence model and ten days of AQI 100; Mumbai has a model
/// but only three days of history.
async fn setup_test_app() -> TestApp {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::SAMPLER).await;
    health_registry.register(components::PREDICTOR).await;
    health_registry.register(components::OBSERVATIONS).await;

    let models = Arc::new(ModelRegistry::new());
    let persistence = Arc::new(LinearModel {
        version: "test".to_string(),
        intercept: 0.0,
        coefficients: Coefficients {
            aqi_lag_1_day: 1.0,
            ..Default::default()
        },
        validation_mae: 30.0,
    });
    models.register("delhi", persistence.clone());
    models.register("mumbai", persistence);

    let history = Arc::new(HistoryStore::default());
    let today = Utc::now().date_naive();
    for back in 1..=10 {
        history.insert_daily("delhi", today - Duration::days(back), 100.0);
    }
    for back in 1..=3 {
        history.insert_daily("mumbai", today - Duration::days(back), 60.0);
    }

    let observations = Arc::new(InMemoryObservations::new());
    let forecasts = Arc::new(ForecastService::new(
        CalibrationEngine::new(CalibrationConfig::default()).unwrap(),
        models,
        observations.clone(),
        history,
        StructuredLogger::new("test-node"),
    ));

    let store = Arc::new(TimeSeriesStore::new(100).unwrap());
    let start = Utc.with_ymd_and_hms(2024, 11, 15, 8, 0, 0).unwrap();
    for i in 0..5 {
        store.append(MetricSample {
            timestamp: start + Duration::seconds(2 * i),
            cpu_percent: 10.0,
            memory_percent: 50.0,
            net_sent_bytes: 1024 * i as u64,
            net_recv_bytes: 4096 * i as u64,
            process_rss_bytes: 32 << 20,
        });
    }

    let state = Arc::new(
        AppState::new(health_registry, AgentMetrics::new(), forecasts, store)
            .with_pushed_observations(observations),
    );
    TestApp {
        router: create_router(state.clone()),
        state,
    }
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let app = setup_test_app().await;
    let (status, health) = send(app.router, get("/healthz")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["sampler"].is_object());
    assert!(health["components"]["observations"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_observations_degraded() {
    let app = setup_test_app().await;
    app.state
        .health_registry
        .set_degraded(components::OBSERVATIONS, "AQICN timed out")
        .await;

    let (status, health) = send(app.router, get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let app = setup_test_app().await;
    app.state
        .health_registry
        .set_unhealthy(components::PREDICTOR, "No models found")
        .await;

    let (status, health) = send(app.router, get("/healthz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_follows_startup() {
    let app = setup_test_app().await;
    let (status, readiness) = send(app.router.clone(), get("/readyz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);

    app.state.health_registry.set_ready(true).await;
    let (status, readiness) = send(app.router, get("/readyz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_degraded_forecast_without_anchor() {
    let app = setup_test_app().await;
    let (status, body) = send(app.router, get("/api/v1/forecast/delhi")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entity_id"], "delhi");
    assert!(body["anchor_used"].is_null());

    let days = body["days"].as_array().unwrap();
    assert_eq!(days.len(), 3);
    for (i, day) in days.iter().enumerate() {
        assert_eq!(day["day_offset"], i);
        assert_eq!(day["corrected_value"], 100.0);
        assert_eq!(day["blend_weight"], 0.0);
        assert_eq!(day["category"], "satisfactory");
    }
}

#[tokio::test]
async fn test_pushed_anchor_corrects_forecast() {
    let app = setup_test_app().await;

    let (status, pushed) = send(
        app.router.clone(),
        post_json("/api/v1/observations/delhi", serde_json::json!({ "aqi": 220.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(pushed["accepted"], true);

    let (status, body) = send(app.router, get("/api/v1/forecast/delhi")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["anchor_used"]["aqi_value"], 220.0);

    let days = body["days"].as_array().unwrap();
    let corrected: Vec<f64> = days
        .iter()
        .map(|d| d["corrected_value"].as_f64().unwrap())
        .collect();
    let raw: Vec<f64> = days.iter().map(|d| d["raw_value"].as_f64().unwrap()).collect();
    assert!(corrected[0] > raw[0]);
    // correction halves each day
    let c0 = corrected[0] - raw[0];
    let c1 = corrected[1] - raw[1];
    assert!((c1 - c0 / 2.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_forecast_unknown_city_is_404() {
    let app = setup_test_app().await;
    let (status, body) = send(app.router, get("/api/v1/forecast/atlantis")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("atlantis"));
}

#[tokio::test]
async fn test_forecast_short_history_is_422() {
    let app = setup_test_app().await;
    let (status, _) = send(app.router, get("/api/v1/forecast/mumbai")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_invalid_observation_rejected() {
    let app = setup_test_app().await;
    let (status, _) = send(
        app.router,
        post_json("/api/v1/observations/delhi", serde_json::json!({ "aqi": -5.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_monitor_samples_since() {
    let app = setup_test_app().await;

    let (status, all) = send(app.router.clone(), get("/api/v1/monitor/samples")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 5);

    let (status, recent) = send(
        app.router,
        get("/api/v1/monitor/samples?since=2024-11-15T08:00:04Z"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(recent.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_monitor_network_rates() {
    let app = setup_test_app().await;
    let (status, rates) = send(app.router, get("/api/v1/monitor/network")).await;

    assert_eq!(status, StatusCode::OK);
    let rates = rates.as_array().unwrap();
    assert_eq!(rates.len(), 4);
    // 4096 bytes every 2 seconds
    assert_eq!(rates[0]["recv_kib_per_sec"], 2.0);
    assert_eq!(rates[0]["sent_kib_per_sec"], 0.5);
}

#[tokio::test]
async fn test_monitor_stats() {
    let app = setup_test_app().await;
    let (status, stats) = send(app.router, get("/api/v1/monitor/stats")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["entries"], 5);
    assert_eq!(stats["capacity"], 100);
    assert_eq!(stats["rejected"], 0);
}

#[tokio::test]
async fn test_classify() {
    let app = setup_test_app().await;
    let (status, body) = send(app.router.clone(), get("/api/v1/classify?aqi=132")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["category"], "moderate");
    assert_eq!(body["label"], "Moderate");
    assert_eq!(body["range"], "101-200");

    let (status, _) = send(app.router, get("/api/v1/classify?aqi=-1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_risks_unavailable_without_pollutant_source() {
    let app = setup_test_app().await;
    let (status, _) = send(app.router, get("/api/v1/cities/delhi/risks")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let app = setup_test_app().await;

    // Generate a forecast so the forecast histogram has observations
    let _ = send(app.router.clone(), get("/api/v1/forecast/delhi")).await;

    let response = app.router.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("breathe_forecast_latency_seconds_bucket"));
    assert!(metrics_text.contains("breathe_forecasts_generated_total"));
    assert!(metrics_text.contains("breathe_store_samples"));
}
