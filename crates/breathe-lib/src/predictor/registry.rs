//! Keyed lookup of trained models, one per entity

use super::features::{FeatureExtractor, MIN_HISTORY_DAYS};
use super::linear::LinearModel;
use super::{PredictionInput, RawPredictor, Regressor};
use crate::error::{ForecastError, Result};
use crate::models::RawForecast;
use chrono::Duration;
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registry of per-entity regressors
pub struct ModelRegistry {
    models: DashMap<String, Arc<dyn Regressor>>,
    extractor: FeatureExtractor,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            models: DashMap::new(),
            extractor: FeatureExtractor::new(),
        }
    }

    /// Register or replace the model for an entity
    pub fn register(&self, entity_id: impl Into<String>, model: Arc<dyn Regressor>) {
        let entity_id = entity_id.into();
        debug!(entity_id = %entity_id, version = %model.version(), "Registering model");
        self.models.insert(entity_id, model);
    }

    pub fn unregister(&self, entity_id: &str) -> Option<Arc<dyn Regressor>> {
        self.models.remove(entity_id).map(|(_, v)| v)
    }

    pub fn get(&self, entity_id: &str) -> Option<Arc<dyn Regressor>> {
        self.models.get(entity_id).map(|r| Arc::clone(r.value()))
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.models.contains_key(entity_id)
    }

    /// Registered entities, sorted
    pub fn entities(&self) -> Vec<String> {
        let mut entities: Vec<_> = self.models.iter().map(|r| r.key().clone()).collect();
        entities.sort();
        entities
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Load every `<entity>.json` [`LinearModel`] in `dir`.
    ///
    /// A bad model file is logged and skipped so one entity cannot keep the
    /// others from loading. Returns the number of models registered.
    pub fn load_dir(&self, dir: &Path) -> Result<usize> {
        let entries = std::fs::read_dir(dir).map_err(|e| ForecastError::ModelLoad {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut loaded = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(entity_id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match LinearModel::load(&path) {
                Ok(model) => {
                    self.register(entity_id, Arc::new(model));
                    loaded += 1;
                }
                Err(e) => warn!(path = ?path, error = %e, "Skipping model file"),
            }
        }

        info!(dir = ?dir, models = loaded, "Models loaded");
        Ok(loaded)
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RawPredictor for ModelRegistry {
    /// Recursive multi-step forecast: each predicted day becomes the most
    /// recent history entry for the next step.
    fn predict(&self, entity_id: &str, input: &PredictionInput) -> Result<RawForecast> {
        let model = self
            .get(entity_id)
            .ok_or_else(|| ForecastError::ModelUnavailable {
                entity_id: entity_id.to_string(),
            })?;

        let available = self.extractor.available_days(&input.history, input.start_date);
        if available < MIN_HISTORY_DAYS {
            return Err(ForecastError::InsufficientHistory {
                entity_id: entity_id.to_string(),
                required: MIN_HISTORY_DAYS,
                available,
            });
        }

        let mut working = input.history.clone();
        let mut values = Vec::with_capacity(input.horizon_days);
        for offset in 0..input.horizon_days {
            let date = input.start_date + Duration::days(offset as i64);
            let features = self.extractor.extract(&working, date).ok_or_else(|| {
                ForecastError::InsufficientHistory {
                    entity_id: entity_id.to_string(),
                    required: MIN_HISTORY_DAYS,
                    available: self.extractor.available_days(&working, date),
                }
            })?;
            let value = model.predict_one(&features);
            working.insert(date, value);
            values.push(value);
        }

        debug!(
            entity_id = %entity_id,
            version = %model.version(),
            horizon_days = input.horizon_days,
            "Raw forecast produced"
        );

        Ok(RawForecast {
            entity_id: entity_id.to_string(),
            issued_at: input.issued_at,
            horizon_days: input.horizon_days,
            values,
            model_error: model.validation_error(),
        })
    }
}
