//! Periodic sampling loop
//!
//! Runs for the lifetime of the agent, independent of forecast requests.
//! Each tick takes one sample and appends it to the store; a failed sample is
//! logged and skipped.

use super::MetricSource;
use crate::error::{ForecastError, Result};
use crate::health::{components, HealthRegistry};
use crate::observability::{AgentMetrics, StructuredLogger};
use crate::store::{AppendOutcome, TimeSeriesStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Default sampling period
pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_secs(2);

/// Consecutive failures before the sampler is reported unhealthy
const UNHEALTHY_AFTER_FAILURES: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerConfig {
    pub period: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_SAMPLE_PERIOD,
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.period.is_zero() {
            return Err(ForecastError::invalid_config(
                "sample period must be positive",
            ));
        }
        Ok(())
    }
}

/// Drives a [`MetricSource`] into a [`TimeSeriesStore`]
pub struct SamplingLoop {
    source: Arc<dyn MetricSource>,
    store: Arc<TimeSeriesStore>,
    config: SamplerConfig,
    metrics: AgentMetrics,
    logger: StructuredLogger,
    health: Option<HealthRegistry>,
    consecutive_failures: u32,
}

impl SamplingLoop {
    pub fn new(
        source: Arc<dyn MetricSource>,
        store: Arc<TimeSeriesStore>,
        config: SamplerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            store,
            config,
            metrics: AgentMetrics::new(),
            logger: StructuredLogger::new("local"),
            health: None,
            consecutive_failures: 0,
        })
    }

    /// Run until a shutdown signal arrives
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            period_ms = self.config.period.as_millis() as u64,
            capacity = self.store.capacity(),
            "Starting sampling loop"
        );

        let mut ticker = interval(self.config.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.recv() => {
                    info!(samples = self.store.len(), "Shutting down sampling loop");
                    break;
                }
            }
        }
    }

    /// Take and store one sample. Returns None if sampling failed.
    pub async fn tick(&mut self) -> Option<AppendOutcome> {
        let start = Instant::now();
        let result = self.source.sample().await;
        self.metrics
            .observe_sample_latency(start.elapsed().as_secs_f64());

        match result {
            Ok(sample) => {
                let timestamp = sample.timestamp;
                let outcome = self.store.append(sample);
                match outcome {
                    AppendOutcome::Rejected => {
                        self.metrics.inc_samples_rejected();
                        self.logger.log_sample_rejected(&timestamp.to_rfc3339());
                    }
                    AppendOutcome::Evicted | AppendOutcome::Appended => {
                        debug!(timestamp = %timestamp, evicted = outcome == AppendOutcome::Evicted, "Sample stored");
                    }
                }
                self.metrics.set_store_samples(self.store.len());
                self.record_success().await;
                Some(outcome)
            }
            Err(e) => {
                warn!(error = %e, "Metric sample failed, skipping tick");
                self.record_failure(&e).await;
                None
            }
        }
    }

    async fn record_success(&mut self) {
        if self.consecutive_failures > 0 {
            self.consecutive_failures = 0;
            if let Some(health) = &self.health {
                health.set_healthy(components::SAMPLER).await;
            }
        }
    }

    async fn record_failure(&mut self, error: &ForecastError) {
        self.consecutive_failures += 1;
        let Some(health) = &self.health else {
            return;
        };
        if self.consecutive_failures >= UNHEALTHY_AFTER_FAILURES {
            health
                .set_unhealthy(components::SAMPLER, error.to_string())
                .await;
        } else {
            health
                .set_degraded(components::SAMPLER, error.to_string())
                .await;
        }
    }
}

/// Builder for creating the sampling loop
pub struct SamplingLoopBuilder {
    source: Option<Arc<dyn MetricSource>>,
    store: Option<Arc<TimeSeriesStore>>,
    config: SamplerConfig,
    health: Option<HealthRegistry>,
    node_name: String,
}

impl SamplingLoopBuilder {
    pub fn new() -> Self {
        Self {
            source: None,
            store: None,
            config: SamplerConfig::default(),
            health: None,
            node_name: "local".to_string(),
        }
    }

    pub fn source(mut self, source: Arc<dyn MetricSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn store(mut self, store: Arc<TimeSeriesStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn period(mut self, period: Duration) -> Self {
        self.config.period = period;
        self
    }

    /// Report sampler status to this registry
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn node_name(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = node_name.into();
        self
    }

    pub fn build(self) -> Result<SamplingLoop> {
        let source = self
            .source
            .ok_or_else(|| ForecastError::invalid_config("sampling loop needs a metric source"))?;
        let store = self
            .store
            .ok_or_else(|| ForecastError::invalid_config("sampling loop needs a store"))?;

        let mut sampling = SamplingLoop::new(source, store, self.config)?;
        sampling.health = self.health;
        sampling.logger = StructuredLogger::new(self.node_name);
        Ok(sampling)
    }
}

impl Default for SamplingLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
