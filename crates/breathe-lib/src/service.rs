//! Forecast request orchestration
//!
//! One call per request: look up the live anchor, extend the daily history
//! with it, run the raw predictor and calibrate. Requests share nothing but
//! the history store, so any number may run concurrently.

use crate::calibration::CalibrationEngine;
use crate::error::Result;
use crate::history::HistoryStore;
use crate::models::{Anchor, ForecastSeries};
use crate::observability::{AgentMetrics, StructuredLogger};
use crate::observation::LiveObservationSource;
use crate::predictor::{PredictionInput, RawPredictor};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub struct ForecastService {
    engine: CalibrationEngine,
    predictor: Arc<dyn RawPredictor>,
    observations: Arc<dyn LiveObservationSource>,
    history: Arc<HistoryStore>,
    metrics: AgentMetrics,
    logger: StructuredLogger,
}

impl ForecastService {
    pub fn new(
        engine: CalibrationEngine,
        predictor: Arc<dyn RawPredictor>,
        observations: Arc<dyn LiveObservationSource>,
        history: Arc<HistoryStore>,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            engine,
            predictor,
            observations,
            history,
            metrics: AgentMetrics::new(),
            logger,
        }
    }

    pub fn engine(&self) -> &CalibrationEngine {
        &self.engine
    }

    pub fn observations(&self) -> &Arc<dyn LiveObservationSource> {
        &self.observations
    }

    /// Produce a calibrated forecast for `entity_id` as of now
    pub async fn forecast(&self, entity_id: &str) -> Result<ForecastSeries> {
        let start = Instant::now();
        let anchor = self.observations.latest(entity_id).await;
        let result = self.forecast_with(entity_id, anchor.as_ref(), Utc::now());
        self.metrics
            .observe_forecast_latency(start.elapsed().as_secs_f64());

        match &result {
            Ok(series) => {
                self.metrics.inc_forecasts_generated(series.is_degraded());
                self.logger.log_forecast(series);
            }
            Err(e) => {
                self.metrics.inc_forecast_errors();
                self.logger.log_forecast_failed(entity_id, &e.to_string());
            }
        }
        result
    }

    /// Synchronous core of [`forecast`](Self::forecast) with an already
    /// resolved anchor and clock
    pub fn forecast_with(
        &self,
        entity_id: &str,
        anchor: Option<&Anchor>,
        now: DateTime<Utc>,
    ) -> Result<ForecastSeries> {
        if let Some(anchor) = anchor.filter(|a| a.entity_id == entity_id) {
            self.history.record_anchor(anchor);
        }

        let history = self.history.history(entity_id).unwrap_or_default();
        debug!(entity_id = %entity_id, history_days = history.len(), "Building forecast");

        let input = PredictionInput::starting_at(history, now, self.engine.horizon_days());
        let raw = self.predictor.predict(entity_id, &input)?;
        self.engine.calibrate_at(&raw, anchor, now)
    }
}
