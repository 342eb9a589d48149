//! Live AQI observation sources
//!
//! A source answers with the latest trusted reading for an entity, or `None`
//! when it has nothing usable. Failures are never errors: the forecast falls
//! back to the raw model.

use crate::models::Anchor;
use crate::pollutant::PollutantReadings;
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

/// Provider of ground-truth anchors
#[async_trait]
pub trait LiveObservationSource: Send + Sync {
    /// Latest reading for the entity, if any
    async fn latest(&self, entity_id: &str) -> Option<Anchor>;

    /// Per-pollutant concentrations behind the latest reading
    async fn pollutants(&self, _entity_id: &str) -> Option<PollutantReadings> {
        None
    }

    /// Short name used in logs and health reports
    fn name(&self) -> &'static str;
}

/// Anchors pushed in by callers, newest reading per entity
#[derive(Default)]
pub struct InMemoryObservations {
    anchors: DashMap<String, Anchor>,
}

impl InMemoryObservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a reading unless a newer one is already held.
    /// Returns whether the reading became the entity's latest.
    pub fn push(&self, anchor: Anchor) -> bool {
        let mut replaced = false;
        self.anchors
            .entry(anchor.entity_id.clone())
            .and_modify(|current| {
                if anchor.observed_at >= current.observed_at {
                    *current = anchor.clone();
                    replaced = true;
                }
            })
            .or_insert_with(|| {
                replaced = true;
                anchor.clone()
            });

        debug!(
            entity_id = %anchor.entity_id,
            aqi = anchor.aqi_value,
            accepted = replaced,
            "Observation pushed"
        );
        replaced
    }

    pub fn clear(&self, entity_id: &str) -> Option<Anchor> {
        self.anchors.remove(entity_id).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

#[async_trait]
impl LiveObservationSource for InMemoryObservations {
    async fn latest(&self, entity_id: &str) -> Option<Anchor> {
        self.anchors.get(entity_id).map(|r| r.value().clone())
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}
