//! Self-correcting AQI forecast engine
//!
//! This crate provides the core functionality for:
//! - Anchor-and-trend calibration of raw model forecasts
//! - CPCB health classification and pollutant risk interpretation
//! - Per-entity raw predictors and their daily history
//! - Bounded host metric sampling for the monitoring view
//! - Health checks and observability

pub mod calibration;
pub mod classifier;
pub mod error;
pub mod health;
pub mod history;
pub mod models;
pub mod observability;
pub mod observation;
pub mod pollutant;
pub mod predictor;
pub mod sampler;
pub mod service;
pub mod store;

pub use calibration::{BlendCurve, CalibrationConfig, CalibrationEngine};
pub use classifier::{classify, RiskCategory};
pub use error::{ForecastError, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use history::HistoryStore;
pub use models::*;
pub use observability::{AgentMetrics, StructuredLogger};
pub use observation::{InMemoryObservations, LiveObservationSource};
pub use service::ForecastService;
pub use store::{AppendOutcome, StoreConfig, StoreStats, TimeSeriesStore};
