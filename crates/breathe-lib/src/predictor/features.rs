//! Lag feature extraction from daily AQI history

use crate::history::DailyHistory;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Prior days needed to fill the 7-day lag
pub const MIN_HISTORY_DAYS: usize = 7;

/// Input to a one-step daily regressor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Most recent daily AQI before the target day
    pub aqi_lag_1_day: f64,
    /// Daily AQI seven recorded days before the target day
    pub aqi_lag_7_day: f64,
    /// Monday = 0 ... Sunday = 6
    pub day_of_week: f64,
    /// 1 ... 12
    pub month: f64,
}

/// Builds feature vectors for a target day from the days recorded before it
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Number of recorded days strictly before `target`
    pub fn available_days(&self, history: &DailyHistory, target: NaiveDate) -> usize {
        history.range(..target).count()
    }

    pub fn has_sufficient_data(&self, history: &DailyHistory, target: NaiveDate) -> bool {
        self.available_days(history, target) >= MIN_HISTORY_DAYS
    }

    /// Lags count recorded days, not calendar days, so gaps in the history
    /// shift the window back rather than invalidating it.
    pub fn extract(&self, history: &DailyHistory, target: NaiveDate) -> Option<FeatureVector> {
        let mut prior = history.range(..target).rev().map(|(_, v)| *v);
        let aqi_lag_1_day = prior.next()?;
        let aqi_lag_7_day = prior.nth(MIN_HISTORY_DAYS - 2)?;

        Some(FeatureVector {
            aqi_lag_1_day,
            aqi_lag_7_day,
            day_of_week: target.weekday().num_days_from_monday() as f64,
            month: target.month() as f64,
        })
    }
}
