//! Observability infrastructure for the forecast agent
//!
//! Provides:
//! - Prometheus metrics (sampling latency, forecast latency, store size, loaded models)
//! - Structured JSON logging with tracing

use crate::models::ForecastSeries;
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

struct AgentMetricsInner {
    sample_latency_seconds: Histogram,
    forecast_latency_seconds: Histogram,
    store_samples: IntGauge,
    samples_rejected: IntCounter,
    forecasts_generated: IntCounter,
    forecasts_degraded: IntCounter,
    forecast_errors: IntCounter,
    models_loaded: IntGauge,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            sample_latency_seconds: register_histogram!(
                "breathe_sample_latency_seconds",
                "Time spent taking one host metric sample",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register sample_latency_seconds"),

            forecast_latency_seconds: register_histogram!(
                "breathe_forecast_latency_seconds",
                "Time spent producing one calibrated forecast, including the live lookup",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register forecast_latency_seconds"),

            store_samples: register_int_gauge!(
                "breathe_store_samples",
                "Number of metric samples held in the time series store"
            )
            .expect("Failed to register store_samples"),

            samples_rejected: register_int_counter!(
                "breathe_samples_rejected_total",
                "Metric samples dropped for arriving out of order"
            )
            .expect("Failed to register samples_rejected"),

            forecasts_generated: register_int_counter!(
                "breathe_forecasts_generated_total",
                "Calibrated forecasts returned"
            )
            .expect("Failed to register forecasts_generated"),

            forecasts_degraded: register_int_counter!(
                "breathe_forecasts_degraded_total",
                "Forecasts returned without a usable live anchor"
            )
            .expect("Failed to register forecasts_degraded"),

            forecast_errors: register_int_counter!(
                "breathe_forecast_errors_total",
                "Forecast requests that failed"
            )
            .expect("Failed to register forecast_errors"),

            models_loaded: register_int_gauge!(
                "breathe_models_loaded",
                "Number of per-entity models in the registry"
            )
            .expect("Failed to register models_loaded"),
        }
    }
}

/// Agent metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new)
    }

    pub fn observe_sample_latency(&self, duration_secs: f64) {
        self.inner().sample_latency_seconds.observe(duration_secs);
    }

    pub fn observe_forecast_latency(&self, duration_secs: f64) {
        self.inner().forecast_latency_seconds.observe(duration_secs);
    }

    pub fn set_store_samples(&self, count: usize) {
        self.inner().store_samples.set(count as i64);
    }

    pub fn inc_samples_rejected(&self) {
        self.inner().samples_rejected.inc();
    }

    /// Count a returned forecast, and whether it ran without an anchor
    pub fn inc_forecasts_generated(&self, degraded: bool) {
        self.inner().forecasts_generated.inc();
        if degraded {
            self.inner().forecasts_degraded.inc();
        }
    }

    pub fn inc_forecast_errors(&self) {
        self.inner().forecast_errors.inc();
    }

    pub fn set_models_loaded(&self, count: usize) {
        self.inner().models_loaded.set(count as i64);
    }
}

/// Structured logger for agent events
///
/// Each event carries an `event` field so log pipelines can filter on it.
/// `forecast_generated` is the audit trail of every served forecast.
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn log_forecast(&self, series: &ForecastSeries) {
        let day0_weight = series.days().first().map(|d| d.blend_weight).unwrap_or(0.0);
        info!(
            event = "forecast_generated",
            node = %self.node_name,
            entity_id = %series.entity_id,
            anchor_used = series.anchor_used.is_some(),
            anchor_aqi = ?series.anchor_used.as_ref().map(|a| a.aqi_value),
            blend_weight = day0_weight,
            raw_values = ?series.days().iter().map(|d| d.raw_value).collect::<Vec<_>>(),
            corrected_values = ?series.corrected_values(),
            model_error = series.model_error,
            confidence = series.confidence,
            "Generated calibrated forecast"
        );
    }

    pub fn log_forecast_failed(&self, entity_id: &str, error: &str) {
        warn!(
            event = "forecast_failed",
            node = %self.node_name,
            entity_id = %entity_id,
            error = %error,
            "Forecast request failed"
        );
    }

    pub fn log_sample_rejected(&self, timestamp: &str) {
        warn!(
            event = "sample_rejected",
            node = %self.node_name,
            timestamp = %timestamp,
            "Metric sample rejected as out of order"
        );
    }

    pub fn log_models_loaded(&self, count: usize, source: &str) {
        info!(
            event = "model_loaded",
            node = %self.node_name,
            models = count,
            source = %source,
            "Forecast models loaded"
        );
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, observation_source: &str) {
        info!(
            event = "agent_started",
            node = %self.node_name,
            agent_version = %version,
            observation_source = %observation_source,
            "Forecast agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Forecast agent shutting down"
        );
    }
}
