//! HTTP API: forecasts, monitoring, health checks and Prometheus metrics

use breathe_lib::{
    classifier::classify,
    health::{ComponentStatus, HealthRegistry},
    models::{Anchor, ForecastSeries},
    observability::AgentMetrics,
    observation::InMemoryObservations,
    pollutant::{interpret_pollutant_risks, PollutantReadings, PollutantRisk},
    service::ForecastService,
    store::TimeSeriesStore,
    ForecastError,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: AgentMetrics,
    pub forecasts: Arc<ForecastService>,
    pub store: Arc<TimeSeriesStore>,
    /// Present when anchors are pushed over the API rather than fetched
    pub pushed_observations: Option<Arc<InMemoryObservations>>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: AgentMetrics,
        forecasts: Arc<ForecastService>,
        store: Arc<TimeSeriesStore>,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            forecasts,
            store,
            pushed_observations: None,
        }
    }

    pub fn with_pushed_observations(mut self, observations: Arc<InMemoryObservations>) -> Self {
        self.pushed_observations = Some(observations);
        self
    }
}

/// JSON error body with a status code
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: &self.message })).into_response()
    }
}

impl From<ForecastError> for ApiError {
    fn from(err: ForecastError) -> Self {
        let status = match &err {
            ForecastError::ModelUnavailable { .. } => StatusCode::NOT_FOUND,
            ForecastError::InsufficientHistory { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ForecastError::MalformedForecast { .. } => StatusCode::BAD_GATEWAY,
            ForecastError::InvalidConfiguration { .. }
            | ForecastError::ModelLoad { .. }
            | ForecastError::Sampling(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    state.metrics.set_store_samples(state.store.len());

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

#[derive(Serialize)]
struct ForecastResponse {
    #[serde(flatten)]
    series: ForecastSeries,
    #[serde(skip_serializing_if = "Option::is_none")]
    low_confidence_reason: Option<&'static str>,
}

async fn forecast(
    State(state): State<Arc<AppState>>,
    Path(city): Path<String>,
) -> Result<Json<ForecastResponse>, ApiError> {
    let series = state.forecasts.forecast(&city).await?;
    let low_confidence_reason = series.low_confidence_reason();
    Ok(Json(ForecastResponse {
        series,
        low_confidence_reason,
    }))
}

#[derive(Debug, Deserialize)]
struct SinceQuery {
    since: Option<DateTime<Utc>>,
}

async fn monitor_samples(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SinceQuery>,
) -> impl IntoResponse {
    Json(state.store.snapshot(query.since))
}

async fn monitor_network(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SinceQuery>,
) -> impl IntoResponse {
    Json(state.store.network_rates(query.since))
}

async fn monitor_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.store.stats())
}

#[derive(Debug, Deserialize)]
pub struct ObservationRequest {
    pub aqi: f64,
    /// Defaults to the time the request is received
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct ObservationResponse {
    accepted: bool,
    anchor: Anchor,
}

async fn push_observation(
    State(state): State<Arc<AppState>>,
    Path(city): Path<String>,
    Json(request): Json<ObservationRequest>,
) -> Result<(StatusCode, Json<ObservationResponse>), ApiError> {
    let Some(observations) = &state.pushed_observations else {
        return Err(ApiError::new(
            StatusCode::CONFLICT,
            "Live observations come from AQICN; pushed readings are disabled",
        ));
    };

    let anchor = Anchor::new(
        city,
        request.observed_at.unwrap_or_else(Utc::now),
        request.aqi,
    );
    if !anchor.has_valid_value() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("AQI must be a non-negative number, got {}", request.aqi),
        ));
    }

    let accepted = observations.push(anchor.clone());
    Ok((
        StatusCode::ACCEPTED,
        Json(ObservationResponse { accepted, anchor }),
    ))
}

#[derive(Serialize)]
struct RisksResponse {
    city: String,
    pollutants: PollutantReadings,
    risks: Vec<PollutantRisk>,
    /// Human-readable form of `risks`
    advisories: Vec<String>,
}

async fn city_risks(
    State(state): State<Arc<AppState>>,
    Path(city): Path<String>,
) -> Result<Json<RisksResponse>, ApiError> {
    let pollutants = state
        .forecasts
        .observations()
        .pollutants(&city)
        .await
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::NOT_FOUND,
                format!("No pollutant readings available for {}", city),
            )
        })?;

    let risks = interpret_pollutant_risks(&pollutants);
    let advisories = risks.iter().map(ToString::to_string).collect();
    Ok(Json(RisksResponse {
        city,
        pollutants,
        risks,
        advisories,
    }))
}

#[derive(Debug, Deserialize)]
struct ClassifyQuery {
    aqi: f64,
}

#[derive(Serialize)]
struct ClassifyResponse {
    aqi: f64,
    category: breathe_lib::RiskCategory,
    label: &'static str,
    range: &'static str,
    color: &'static str,
    advisory: &'static str,
}

async fn classify_aqi(Query(query): Query<ClassifyQuery>) -> Result<Json<ClassifyResponse>, ApiError> {
    if !query.aqi.is_finite() || query.aqi < 0.0 {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("AQI must be a non-negative number, got {}", query.aqi),
        ));
    }
    let (category, advisory) = classify(query.aqi);
    Ok(Json(ClassifyResponse {
        aqi: query.aqi,
        category,
        label: category.label(),
        range: category.band().range,
        color: category.color(),
        advisory,
    }))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/forecast/:city", get(forecast))
        .route("/api/v1/monitor/samples", get(monitor_samples))
        .route("/api/v1/monitor/network", get(monitor_network))
        .route("/api/v1/monitor/stats", get(monitor_stats))
        .route("/api/v1/observations/:city", post(push_observation))
        .route("/api/v1/cities/:city/risks", get(city_risks))
        .route("/api/v1/classify", get(classify_aqi))
        .with_state(state)
}

/// Serve the API until a shutdown signal arrives
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    Ok(())
}
