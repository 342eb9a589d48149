//! Core data models for the forecast engine

use crate::classifier::RiskCategory;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Uncalibrated multi-day AQI forecast produced by a trained per-entity model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawForecast {
    pub entity_id: String,
    pub issued_at: DateTime<Utc>,
    pub horizon_days: usize,
    /// One AQI point per day, day 0 first
    pub values: Vec<f64>,
    /// Historical validation MAE of the model that produced `values`
    pub model_error: f64,
}

/// Most recent trusted ground-truth AQI reading for an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub entity_id: String,
    pub observed_at: DateTime<Utc>,
    pub aqi_value: f64,
}

impl Anchor {
    pub fn new(entity_id: impl Into<String>, observed_at: DateTime<Utc>, aqi_value: f64) -> Self {
        Self {
            entity_id: entity_id.into(),
            observed_at,
            aqi_value,
        }
    }

    /// Whether the reading is recent enough to correct a forecast issued at `now`.
    /// Readings stamped slightly in the future (source clock ahead of ours) count as fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now.signed_duration_since(self.observed_at) <= window
    }

    /// A usable AQI is finite and non-negative
    pub fn has_valid_value(&self) -> bool {
        self.aqi_value.is_finite() && self.aqi_value >= 0.0
    }
}

/// One calibrated forecast day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedDay {
    pub day_offset: usize,
    pub raw_value: f64,
    pub corrected_value: f64,
    pub blend_weight: f64,
    pub category: RiskCategory,
    pub advisory: String,
}

impl CalibratedDay {
    /// Correction applied on top of the raw model output
    pub fn correction(&self) -> f64 {
        self.corrected_value - self.raw_value
    }
}

/// Calibrated multi-day forecast handed to the presentation layer.
///
/// Days are contiguous from offset 0; the series is only built by the
/// calibration engine and cannot be modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSeries {
    pub entity_id: String,
    pub generated_at: DateTime<Utc>,
    pub anchor_used: Option<Anchor>,
    pub model_error: f64,
    pub confidence: f64,
    days: Vec<CalibratedDay>,
}

impl ForecastSeries {
    pub(crate) fn new(
        entity_id: String,
        generated_at: DateTime<Utc>,
        anchor_used: Option<Anchor>,
        model_error: f64,
        confidence: f64,
        days: Vec<CalibratedDay>,
    ) -> Self {
        debug_assert!(days.iter().enumerate().all(|(i, d)| d.day_offset == i));
        Self {
            entity_id,
            generated_at,
            anchor_used,
            model_error,
            confidence,
            days,
        }
    }

    pub fn days(&self) -> &[CalibratedDay] {
        &self.days
    }

    pub fn horizon_days(&self) -> usize {
        self.days.len()
    }

    pub fn is_degraded(&self) -> bool {
        self.anchor_used.is_none()
    }

    pub fn corrected_values(&self) -> Vec<f64> {
        self.days.iter().map(|d| d.corrected_value).collect()
    }

    /// Reason a forecast should be treated with caution (if applicable)
    pub fn low_confidence_reason(&self) -> Option<&'static str> {
        if self.confidence >= 0.5 {
            None
        } else if self.anchor_used.is_none() {
            Some("No live observation available and the model has a high historical error")
        } else {
            Some("Model has a high historical error; forecast leans on the live observation")
        }
    }
}

/// Host resource usage sample produced by the metric sampler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    /// Cumulative bytes sent across all interfaces
    pub net_sent_bytes: u64,
    /// Cumulative bytes received across all interfaces
    pub net_recv_bytes: u64,
    pub process_rss_bytes: u64,
}

/// Network throughput between two consecutive samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRate {
    pub timestamp: DateTime<Utc>,
    pub recv_kib_per_sec: f64,
    pub sent_kib_per_sec: f64,
}

impl NetworkRate {
    /// Rate over the interval ending at `current`. None if the interval is empty
    /// or a counter went backwards (interface reset).
    pub fn between(previous: &MetricSample, current: &MetricSample) -> Option<Self> {
        let elapsed = current
            .timestamp
            .signed_duration_since(previous.timestamp)
            .num_milliseconds() as f64
            / 1000.0;
        if elapsed <= 0.0 {
            return None;
        }
        let recv = current.net_recv_bytes.checked_sub(previous.net_recv_bytes)?;
        let sent = current.net_sent_bytes.checked_sub(previous.net_sent_bytes)?;
        Some(Self {
            timestamp: current.timestamp,
            recv_kib_per_sec: recv as f64 / elapsed / 1024.0,
            sent_kib_per_sec: sent as f64 / elapsed / 1024.0,
        })
    }
}
