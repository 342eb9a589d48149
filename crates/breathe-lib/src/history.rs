//! Per-entity daily AQI history
//!
//! Feeds the lag features of the raw predictor. History is seeded from JSON
//! files at startup and extended with each live anchor, which is folded into
//! a running mean for its UTC day.

use crate::error::{ForecastError, Result};
use crate::models::Anchor;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Daily AQI values for one entity, oldest first
pub type DailyHistory = BTreeMap<NaiveDate, f64>;

/// Days kept per entity; older days are dropped on insert
pub const DEFAULT_RETENTION_DAYS: usize = 90;

/// Running mean of the readings recorded for a single day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyMean {
    pub mean: f64,
    pub count: u32,
}

impl DailyMean {
    fn single(value: f64) -> Self {
        Self {
            mean: value,
            count: 1,
        }
    }

    fn add(&mut self, value: f64) {
        self.count += 1;
        self.mean += (value - self.mean) / self.count as f64;
    }
}

/// One row of a history seed file
#[derive(Debug, Clone, Deserialize)]
struct DailyRecord {
    date: NaiveDate,
    aqi: f64,
}

#[derive(Debug, Default)]
struct EntityHistory {
    days: BTreeMap<NaiveDate, DailyMean>,
    last_observed_at: Option<DateTime<Utc>>,
}

/// Concurrent daily history keyed by entity
pub struct HistoryStore {
    entities: DashMap<String, EntityHistory>,
    retention_days: usize,
}

impl HistoryStore {
    pub fn new(retention_days: usize) -> Self {
        Self {
            entities: DashMap::new(),
            retention_days: retention_days.max(1),
        }
    }

    /// Set the value for a day, replacing anything recorded before
    pub fn insert_daily(&self, entity_id: &str, date: NaiveDate, aqi: f64) {
        if !aqi.is_finite() || aqi < 0.0 {
            warn!(entity_id = %entity_id, %date, aqi, "Ignoring invalid daily AQI");
            return;
        }
        let mut entry = self.entities.entry(entity_id.to_string()).or_default();
        entry.days.insert(date, DailyMean::single(aqi));
        self.trim(&mut entry.days);
    }

    /// Fold a live reading into its day's mean.
    ///
    /// Returns false when the reading is invalid or not newer than the last one
    /// recorded for the entity, so repeated polls of the same observation count once.
    pub fn record_anchor(&self, anchor: &Anchor) -> bool {
        if !anchor.has_valid_value() {
            return false;
        }
        let mut entry = self.entities.entry(anchor.entity_id.clone()).or_default();
        if entry
            .last_observed_at
            .is_some_and(|last| anchor.observed_at <= last)
        {
            return false;
        }
        entry.last_observed_at = Some(anchor.observed_at);

        let date = anchor.observed_at.date_naive();
        entry
            .days
            .entry(date)
            .and_modify(|day| day.add(anchor.aqi_value))
            .or_insert_with(|| DailyMean::single(anchor.aqi_value));
        self.trim(&mut entry.days);

        debug!(
            entity_id = %anchor.entity_id,
            %date,
            aqi = anchor.aqi_value,
            "Recorded anchor into daily history"
        );
        true
    }

    /// Daily means for an entity
    pub fn history(&self, entity_id: &str) -> Option<DailyHistory> {
        self.entities.get(entity_id).map(|entry| {
            entry
                .days
                .iter()
                .map(|(date, day)| (*date, day.mean))
                .collect()
        })
    }

    pub fn day(&self, entity_id: &str, date: NaiveDate) -> Option<DailyMean> {
        self.entities
            .get(entity_id)
            .and_then(|entry| entry.days.get(&date).copied())
    }

    pub fn entities(&self) -> Vec<String> {
        self.entities.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Seed history from every `<entity>.json` file in `dir`.
    ///
    /// Each file holds an array of `{"date": "YYYY-MM-DD", "aqi": <number>}`.
    /// Unreadable files are logged and skipped; returns the number of entities loaded.
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
            match self.load_file(entity_id, &path) {
                Ok(days) => {
                    debug!(entity_id = %entity_id, days, "Loaded daily history");
                    loaded += 1;
                }
                Err(e) => warn!(path = ?path, error = %e, "Skipping history file"),
            }
        }

        info!(dir = ?dir, entities = loaded, "Daily history loaded");
        Ok(loaded)
    }

    fn load_file(&self, entity_id: &str, path: &Path) -> Result<usize> {
        let load_err = |reason: String| ForecastError::ModelLoad {
            path: path.to_path_buf(),
            reason,
        };
        let bytes = std::fs::read(path).map_err(|e| load_err(e.to_string()))?;
        let records: Vec<DailyRecord> =
            serde_json::from_slice(&bytes).map_err(|e| load_err(e.to_string()))?;
        let count = records.len();
        for record in records {
            self.insert_daily(entity_id, record.date, record.aqi);
        }
        Ok(count)
    }

    fn trim(&self, days: &mut BTreeMap<NaiveDate, DailyMean>) {
        while days.len() > self.retention_days {
            days.pop_first();
        }
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_DAYS)
    }
}
