//! Nearest-embedding matcher
//!
//! Classifies a probe embedding as the reference identity at the smallest
//! Euclidean distance. By default every probe is assigned to some identity;
//! an optional `max_distance` turns far matches into the unknown label.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::store::EmbeddingStore;
use crate::error::MatchError;
use crate::utils::math::{argmin, euclidean_distance};

/// Closest known identity for a probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub name: String,
    pub distance: f32,
}

pub struct Matcher {
    store: Arc<EmbeddingStore>,
    max_distance: Option<f32>,
    unknown_label: String,
}

impl Matcher {
    pub fn new(
        store: Arc<EmbeddingStore>,
        max_distance: Option<f32>,
        unknown_label: impl Into<String>,
    ) -> Self {
        Self {
            store,
            max_distance,
            unknown_label: unknown_label.into(),
        }
    }

    /// Matcher without a rejection threshold
    pub fn unconditional(store: Arc<EmbeddingStore>) -> Self {
        Self::new(store, None, "unknown")
    }

    /// Find the record closest to `probe`; ties go to the lowest index
    pub fn find_nearest(&self, probe: &[f32]) -> Result<MatchResult, MatchError> {
        let expected = self.store.dimension().ok_or(MatchError::EmptyStore)?;
        if probe.len() != expected {
            return Err(MatchError::DimensionMismatch {
                expected,
                found: probe.len(),
            });
        }

        let distances: Vec<f32> = self
            .store
            .records()
            .iter()
            .filter_map(|record| euclidean_distance(probe, &record.vector))
            .collect();

        // All distances NaN only happens for a NaN probe; fall back to the first record
        let (idx, distance) = argmin(&distances).unwrap_or((0, f32::NAN));
        Ok(MatchResult {
            name: self.store.records()[idx].name.clone(),
            distance,
        })
    }

    /// Label to publish for a match
    pub fn label_for<'a>(&'a self, result: &'a MatchResult) -> &'a str {
        match self.max_distance {
            Some(limit) if result.distance.is_nan() || result.distance > limit => &self.unknown_label,
            _ => &result.name,
        }
    }
}
