//! Per-entity raw AQI predictors

mod features;
mod linear;
mod registry;

pub use features::{FeatureExtractor, FeatureVector, MIN_HISTORY_DAYS};
pub use linear::{Coefficients, LinearModel};
pub use registry::ModelRegistry;

use crate::error::Result;
use crate::history::DailyHistory;
use crate::models::RawForecast;
use chrono::{DateTime, NaiveDate, Utc};

/// One-step daily regressor trained for a single entity
pub trait Regressor: Send + Sync {
    /// Predict the daily AQI for the day described by `features`
    fn predict_one(&self, features: &FeatureVector) -> f64;

    /// Historical validation MAE in AQI points
    fn validation_error(&self) -> f64;

    fn version(&self) -> &str;
}

/// What a raw predictor needs to forecast one entity
#[derive(Debug, Clone)]
pub struct PredictionInput {
    /// Daily AQI recorded so far
    pub history: DailyHistory,
    /// Calendar day of forecast day 0
    pub start_date: NaiveDate,
    pub horizon_days: usize,
    pub issued_at: DateTime<Utc>,
}

impl PredictionInput {
    /// Forecast starting on the UTC day of `issued_at`
    pub fn starting_at(history: DailyHistory, issued_at: DateTime<Utc>, horizon_days: usize) -> Self {
        Self {
            history,
            start_date: issued_at.date_naive(),
            horizon_days,
            issued_at,
        }
    }
}

/// Source of uncalibrated multi-day forecasts.
///
/// A missing model is an error, never an empty forecast.
pub trait RawPredictor: Send + Sync {
    fn predict(&self, entity_id: &str, input: &PredictionInput) -> Result<RawForecast>;
}
