//! Linear daily AQI regressor loaded from JSON coefficients

use super::features::FeatureVector;
use super::Regressor;
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Feature weights of a [`LinearModel`]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coefficients {
    pub aqi_lag_1_day: f64,
    pub aqi_lag_7_day: f64,
    #[serde(default)]
    pub day_of_week: f64,
    #[serde(default)]
    pub month: f64,
}

/// `intercept + coefficients · features`, trained offline per entity.
///
/// On disk:
///
/// ```json
/// {
///   "version": "2024-11-01",
///   "intercept": 12.0,
///   "coefficients": { "aqi_lag_1_day": 0.7, "aqi_lag_7_day": 0.2 },
///   "validation_mae": 18.5
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    #[serde(default = "default_version")]
    pub version: String,
    pub intercept: f64,
    pub coefficients: Coefficients,
    /// Mean absolute error on held-out data, in AQI points
    pub validation_mae: f64,
}

fn default_version() -> String {
    "unversioned".to_string()
}

impl LinearModel {
    pub fn load(path: &Path) -> Result<Self> {
        let load_err = |reason: String| ForecastError::ModelLoad {
            path: path.to_path_buf(),
            reason,
        };
        let bytes = std::fs::read(path).map_err(|e| load_err(e.to_string()))?;
        let model: LinearModel =
            serde_json::from_slice(&bytes).map_err(|e| load_err(e.to_string()))?;
        model.validate().map_err(load_err)?;
        Ok(model)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let c = &self.coefficients;
        let weights = [
            self.intercept,
            c.aqi_lag_1_day,
            c.aqi_lag_7_day,
            c.day_of_week,
            c.month,
        ];
        if weights.iter().any(|w| !w.is_finite()) {
            return Err("coefficients must be finite".to_string());
        }
        if !self.validation_mae.is_finite() || self.validation_mae < 0.0 {
            return Err(format!(
                "validation_mae must be a non-negative number, got {}",
                self.validation_mae
            ));
        }
        Ok(())
    }
}

impl Regressor for LinearModel {
    fn predict_one(&self, features: &FeatureVector) -> f64 {
        let c = &self.coefficients;
        self.intercept
            + c.aqi_lag_1_day * features.aqi_lag_1_day
            + c.aqi_lag_7_day * features.aqi_lag_7_day
            + c.day_of_week * features.day_of_week
            + c.month * features.month
    }

    fn validation_error(&self) -> f64 {
        self.validation_mae
    }

    fn version(&self) -> &str {
        &self.version
    }
}
