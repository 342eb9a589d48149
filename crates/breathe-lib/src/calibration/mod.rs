//! Anchor-and-trend forecast calibration
//!
//! Corrects a raw model forecast against the latest live observation:
//!
//! 1. Day 0 is blended toward the anchor with a weight derived from the
//!    model's historical error. A model with no error keeps `w_min`; an
//!    arbitrarily bad model approaches `w_max`.
//! 2. The day 0 residual is carried forward to later days, attenuated by
//!    `decay^i`, so the raw model keeps the shape of the curve while today's
//!    observed bias fades with distance.
//!
//! Calibration is a pure function of its inputs and the static configuration.

#[cfg(test)]
mod tests;

use crate::classifier::classify;
use crate::error::{ForecastError, Result};
use crate::models::{Anchor, CalibratedDay, ForecastSeries, RawForecast};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default lower bound on the anchor weight
pub const DEFAULT_W_MIN: f64 = 0.2;

/// Default upper bound on the anchor weight
pub const DEFAULT_W_MAX: f64 = 0.8;

/// Default per-day attenuation of the day 0 correction
pub const DEFAULT_DECAY: f64 = 0.5;

/// Anchors older than this are ignored (24 hours)
pub const DEFAULT_ANCHOR_FRESHNESS: Duration = Duration::from_secs(24 * 60 * 60);

/// Default forecast horizon in days
pub const DEFAULT_HORIZON_DAYS: usize = 3;

/// Model error (AQI points) at which the linear curve reaches `w_max`
pub const DEFAULT_ERROR_CEILING: f64 = 60.0;

/// Model error (AQI points) at which base confidence drops to one half
pub const DEFAULT_CONFIDENCE_ERROR_SCALE: f64 = 50.0;

/// Shape of the mapping from historical model error to anchor weight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlendCurve {
    /// Rises linearly from `w_min` at zero error to `w_max` at `error_ceiling`
    Linear { error_ceiling: f64 },
    /// `w_max - (w_max - w_min) * exp(-error / error_scale)`
    Exponential { error_scale: f64 },
}

impl BlendCurve {
    /// Position within `[w_min, w_max]` as a fraction: 0 at zero error, 1 in the limit
    fn distrust(&self, model_error: f64) -> f64 {
        let fraction = match *self {
            BlendCurve::Linear { error_ceiling } => model_error / error_ceiling,
            BlendCurve::Exponential { error_scale } => 1.0 - (-model_error / error_scale).exp(),
        };
        fraction.clamp(0.0, 1.0)
    }

    fn validate(&self) -> Result<()> {
        let (name, value) = match *self {
            BlendCurve::Linear { error_ceiling } => ("error_ceiling", error_ceiling),
            BlendCurve::Exponential { error_scale } => ("error_scale", error_scale),
        };
        if !value.is_finite() || value <= 0.0 {
            return Err(ForecastError::invalid_config(format!(
                "blend curve {} must be a positive number, got {}",
                name, value
            )));
        }
        Ok(())
    }
}

impl Default for BlendCurve {
    fn default() -> Self {
        BlendCurve::Linear {
            error_ceiling: DEFAULT_ERROR_CEILING,
        }
    }
}

/// Configuration for the calibration engine
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationConfig {
    /// Mapping from model error to anchor weight
    pub blend: BlendCurve,
    /// Anchor weight used for a model with zero historical error
    pub w_min: f64,
    /// Anchor weight approached as the model error grows without bound
    pub w_max: f64,
    /// Per-day attenuation of the day 0 correction, in (0, 1]
    pub decay: f64,
    /// Maximum age of an anchor before it is treated as absent
    pub anchor_freshness: Duration,
    /// Number of days requested from the raw predictor
    pub horizon_days: usize,
    /// Model error at which base confidence is 0.5
    pub confidence_error_scale: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            blend: BlendCurve::default(),
            w_min: DEFAULT_W_MIN,
            w_max: DEFAULT_W_MAX,
            decay: DEFAULT_DECAY,
            anchor_freshness: DEFAULT_ANCHOR_FRESHNESS,
            horizon_days: DEFAULT_HORIZON_DAYS,
            confidence_error_scale: DEFAULT_CONFIDENCE_ERROR_SCALE,
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<()> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.w_min) || !in_unit(self.w_max) {
            return Err(ForecastError::invalid_config(format!(
                "blend weights must lie in [0, 1], got w_min={} w_max={}",
                self.w_min, self.w_max
            )));
        }
        if self.w_min > self.w_max {
            return Err(ForecastError::invalid_config(format!(
                "w_min ({}) must not exceed w_max ({})",
                self.w_min, self.w_max
            )));
        }
        if !(self.decay > 0.0 && self.decay <= 1.0) {
            return Err(ForecastError::invalid_config(format!(
                "decay must lie in (0, 1], got {}",
                self.decay
            )));
        }
        if self.anchor_freshness.is_zero() {
            return Err(ForecastError::invalid_config(
                "anchor freshness window must be positive",
            ));
        }
        if self.horizon_days == 0 {
            return Err(ForecastError::invalid_config(
                "horizon_days must be at least 1",
            ));
        }
        if !self.confidence_error_scale.is_finite() || self.confidence_error_scale <= 0.0 {
            return Err(ForecastError::invalid_config(format!(
                "confidence_error_scale must be a positive number, got {}",
                self.confidence_error_scale
            )));
        }
        self.blend.validate()
    }
}

/// Why an offered anchor was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnchorRejection {
    OtherEntity,
    Stale,
    InvalidValue,
}

/// Stateless forecast calibrator. Safe to share across threads without locking.
#[derive(Debug, Clone)]
pub struct CalibrationEngine {
    config: CalibrationConfig,
    freshness: chrono::Duration,
}

impl CalibrationEngine {
    /// Build an engine, rejecting out-of-range parameters up front
    pub fn new(config: CalibrationConfig) -> Result<Self> {
        config.validate()?;
        let freshness = chrono::Duration::from_std(config.anchor_freshness).map_err(|e| {
            ForecastError::invalid_config(format!("anchor freshness window out of range: {}", e))
        })?;
        Ok(Self { config, freshness })
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub fn horizon_days(&self) -> usize {
        self.config.horizon_days
    }

    /// Weight given to the live anchor for a model with the given historical error
    pub fn blend_weight(&self, model_error: f64) -> f64 {
        let CalibrationConfig { w_min, w_max, .. } = self.config;
        let distrust = self.config.blend.distrust(model_error.max(0.0));
        (w_min + (w_max - w_min) * distrust).clamp(w_min, w_max)
    }

    /// Confidence in the calibrated forecast, in [0, 1]
    fn confidence(&self, model_error: f64, applied_weight: Option<f64>) -> f64 {
        let scale = self.config.confidence_error_scale;
        let base = if model_error.is_finite() {
            scale / (scale + model_error)
        } else {
            0.0
        };
        match applied_weight {
            Some(w) => base + w * (1.0 - base),
            None => base,
        }
    }

    /// Calibrate against the current wall clock
    pub fn calibrate(&self, raw: &RawForecast, anchor: Option<&Anchor>) -> Result<ForecastSeries> {
        self.calibrate_at(raw, anchor, Utc::now())
    }

    /// Calibrate a raw forecast as of `now`.
    ///
    /// A missing, stale, foreign or invalid anchor degrades to the raw model
    /// output with a zero blend weight. Only a raw forecast that violates its
    /// own contract is an error.
    pub fn calibrate_at(
        &self,
        raw: &RawForecast,
        anchor: Option<&Anchor>,
        now: DateTime<Utc>,
    ) -> Result<ForecastSeries> {
        validate_raw(raw)?;

        let anchor = anchor.and_then(|a| match self.check_anchor(raw, a, now) {
            Ok(()) => Some(a),
            Err(reason) => {
                match reason {
                    AnchorRejection::Stale => debug!(
                        entity_id = %raw.entity_id,
                        observed_at = %a.observed_at,
                        "Anchor is stale, using raw forecast"
                    ),
                    AnchorRejection::OtherEntity => warn!(
                        entity_id = %raw.entity_id,
                        anchor_entity = %a.entity_id,
                        "Anchor belongs to another entity, ignoring it"
                    ),
                    AnchorRejection::InvalidValue => warn!(
                        entity_id = %raw.entity_id,
                        aqi = a.aqi_value,
                        "Anchor AQI is not a valid reading, ignoring it"
                    ),
                }
                None
            }
        });

        let raw_today = raw.values[0];
        let weight = anchor.map(|_| self.blend_weight(raw.model_error));
        let blended_today = match (anchor, weight) {
            (Some(a), Some(w)) => w * a.aqi_value + (1.0 - w) * raw_today,
            _ => raw_today,
        };
        // The residual is taken before the non-negative floor so later days
        // carry the anchor's correction rather than the clamp.
        let delta = blended_today - raw_today;
        let w = weight.unwrap_or(0.0);

        let days = raw
            .values
            .iter()
            .enumerate()
            .map(|(i, &raw_value)| {
                let attenuation = self.config.decay.powi(i as i32);
                let corrected_value = (raw_value + delta * attenuation).max(0.0);
                let (category, advisory) = classify(corrected_value);
                CalibratedDay {
                    day_offset: i,
                    raw_value,
                    corrected_value,
                    blend_weight: w * attenuation,
                    category,
                    advisory: advisory.to_string(),
                }
            })
            .collect::<Vec<_>>();

        let confidence = self.confidence(raw.model_error, weight);

        debug!(
            entity_id = %raw.entity_id,
            anchored = anchor.is_some(),
            blend_weight = w,
            delta = delta,
            horizon_days = days.len(),
            "Forecast calibrated"
        );

        Ok(ForecastSeries::new(
            raw.entity_id.clone(),
            now,
            anchor.cloned(),
            raw.model_error,
            confidence,
            days,
        ))
    }

    fn check_anchor(
        &self,
        raw: &RawForecast,
        anchor: &Anchor,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), AnchorRejection> {
        if anchor.entity_id != raw.entity_id {
            return Err(AnchorRejection::OtherEntity);
        }
        if !anchor.has_valid_value() {
            return Err(AnchorRejection::InvalidValue);
        }
        if !anchor.is_fresh(now, self.freshness) {
            return Err(AnchorRejection::Stale);
        }
        Ok(())
    }
}

/// Check a raw forecast against its own contract
fn validate_raw(raw: &RawForecast) -> Result<()> {
    if raw.horizon_days == 0 {
        return Err(ForecastError::malformed(
            &raw.entity_id,
            "horizon_days must be at least 1",
        ));
    }
    if raw.values.len() != raw.horizon_days {
        return Err(ForecastError::malformed(
            &raw.entity_id,
            format!(
                "expected {} daily values, got {}",
                raw.horizon_days,
                raw.values.len()
            ),
        ));
    }
    if let Some(i) = raw.values.iter().position(|v| !v.is_finite()) {
        return Err(ForecastError::malformed(
            &raw.entity_id,
            format!("value for day {} is not finite", i),
        ));
    }
    if raw.model_error.is_nan() || raw.model_error < 0.0 {
        return Err(ForecastError::malformed(
            &raw.entity_id,
            format!("model_error must be non-negative, got {}", raw.model_error),
        ));
    }
    Ok(())
}
