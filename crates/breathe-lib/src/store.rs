//! Bounded in-memory history of host metric samples
//!
//! A fixed-capacity ring buffer shared between one sampler (writer) and any
//! number of monitoring views (readers):
//! - Strictly increasing timestamps; late or duplicate samples are dropped
//! - FIFO eviction once capacity is reached
//! - Readers copy out a snapshot under a short read lock

use crate::error::{ForecastError, Result};
use crate::models::{MetricSample, NetworkRate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Default capacity (one hour at a 2 second sample period)
pub const DEFAULT_STORE_CAPACITY: usize = 1800;

/// Store sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum number of samples retained
    pub capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_STORE_CAPACITY,
        }
    }
}

/// Outcome of an append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Stored without eviction
    Appended,
    /// Stored; the oldest sample was evicted to make room
    Evicted,
    /// Dropped: timestamp not after the newest stored sample
    Rejected,
}

impl AppendOutcome {
    pub fn is_stored(&self) -> bool {
        !matches!(self, AppendOutcome::Rejected)
    }
}

/// Thread-safe, capacity-bounded sample history
#[derive(Debug)]
pub struct TimeSeriesStore {
    samples: RwLock<VecDeque<MetricSample>>,
    capacity: usize,
    rejected: AtomicU64,
}

impl TimeSeriesStore {
    /// Create a store holding at most `capacity` samples
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ForecastError::InvalidConfiguration {
                reason: "store capacity must be at least 1".to_string(),
            });
        }
        Ok(Self {
            samples: RwLock::new(VecDeque::with_capacity(capacity.min(10_000))),
            capacity,
            rejected: AtomicU64::new(0),
        })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Self::new(config.capacity)
    }

    // Poisoning is ignored: no panic can leave the deque half-updated.
    fn read(&self) -> RwLockReadGuard<'_, VecDeque<MetricSample>> {
        self.samples.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, VecDeque<MetricSample>> {
        self.samples.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a sample, evicting the oldest one when full
    pub fn append(&self, sample: MetricSample) -> AppendOutcome {
        let mut samples = self.write();

        if let Some(last_timestamp) = samples.back().map(|s| s.timestamp) {
            if sample.timestamp <= last_timestamp {
                drop(samples);
                self.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(
                    timestamp = %sample.timestamp,
                    last_timestamp = %last_timestamp,
                    "Rejected out-of-order metric sample"
                );
                return AppendOutcome::Rejected;
            }
        }

        let evicted = if samples.len() >= self.capacity {
            samples.pop_front();
            true
        } else {
            false
        };
        samples.push_back(sample);

        if evicted {
            AppendOutcome::Evicted
        } else {
            AppendOutcome::Appended
        }
    }

    /// Copy of every sample with `timestamp >= since` (all samples if `since` is None), oldest first
    pub fn snapshot(&self, since: Option<DateTime<Utc>>) -> Vec<MetricSample> {
        let samples = self.read();
        let start = match since {
            Some(since) => samples.partition_point(|s| s.timestamp < since),
            None => 0,
        };
        samples.range(start..).cloned().collect()
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<MetricSample> {
        self.read().back().cloned()
    }

    /// Network throughput between consecutive samples at or after `since`
    pub fn network_rates(&self, since: Option<DateTime<Utc>>) -> Vec<NetworkRate> {
        let snapshot = self.snapshot(since);
        snapshot
            .windows(2)
            .filter_map(|pair| NetworkRate::between(&pair[0], &pair[1]))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples dropped for arriving out of order
    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Get statistics about the store
    pub fn stats(&self) -> StoreStats {
        let samples = self.read();
        StoreStats {
            entries: samples.len(),
            capacity: self.capacity,
            oldest_timestamp: samples.front().map(|s| s.timestamp),
            newest_timestamp: samples.back().map(|s| s.timestamp),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Store statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub entries: usize,
    pub capacity: usize,
    pub oldest_timestamp: Option<DateTime<Utc>>,
    pub newest_timestamp: Option<DateTime<Utc>>,
    pub rejected: u64,
}
