//! Error types for the forecast engine
//!
//! Only conditions that make a forecast impossible are errors. A missing or
//! stale anchor and an out-of-order metric sample are handled in place and
//! never show up here.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for forecast operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Main error type for the forecast engine.
#[derive(Error, Debug)]
pub enum ForecastError {
    /// No trained predictor is registered for the entity.
    #[error("No trained model available for {entity_id}")]
    ModelUnavailable { entity_id: String },

    /// Engine or store parameters rejected at construction time.
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// A raw forecast that breaks its own contract.
    #[error("Malformed raw forecast for {entity_id}: {reason}")]
    MalformedForecast { entity_id: String, reason: String },

    /// Not enough daily history to build lag features.
    #[error("Insufficient history for {entity_id}: need {required} days, have {available}")]
    InsufficientHistory {
        entity_id: String,
        required: usize,
        available: usize,
    },

    /// A model or history artifact could not be loaded.
    #[error("Failed to load {path:?}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("Sampling failed: {0}")]
    Sampling(String),
}

impl ForecastError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(entity_id: &str, reason: impl Into<String>) -> Self {
        Self::MalformedForecast {
            entity_id: entity_id.to_string(),
            reason: reason.into(),
        }
    }

    /// True when the failure means no forecast can be produced for the entity,
    /// as opposed to a server-side fault.
    pub fn is_entity_scoped(&self) -> bool {
        matches!(
            self,
            Self::ModelUnavailable { .. } | Self::InsufficientHistory { .. }
        )
    }
}
