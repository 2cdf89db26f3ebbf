//! Result types returned by the vector store.

use serde::{Deserialize, Serialize};

use crate::vector::distance::DistanceMetric;
use crate::vector::index::IndexKind;

/// A single search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub fingerprint: String,
    /// Squared L2 distance, or inner product, depending on the metric.
    pub distance: f32,
}

/// A survivor whose slot id changed during a purge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotMove {
    pub fingerprint: String,
    pub old_slot: u64,
    pub new_slot: u64,
}

/// What a purge did to one collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PurgeOutcome {
    pub collection: String,
    /// Fingerprints that no longer exist in the collection.
    pub purged: Vec<String>,
    /// Survivors that were renumbered.
    pub moved: Vec<SlotMove>,
    pub slots_before: usize,
    pub remaining: usize,
}

impl PurgeOutcome {
    pub(crate) fn unchanged(collection: &str, slots: usize) -> Self {
        Self {
            collection: collection.to_string(),
            purged: Vec::new(),
            moved: Vec::new(),
            slots_before: slots,
            remaining: slots,
        }
    }

    /// Number of physical slots reclaimed.
    pub fn reclaimed(&self) -> usize {
        self.slots_before - self.remaining
    }
}

/// Statistics for one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub name: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub kind: IndexKind,
    pub total_slots: usize,
    pub live: usize,
    pub deleted: usize,
    /// Deleted slots over total slots (0.0 to 1.0).
    pub deletion_ratio: f64,
    pub memory_bytes: usize,
}

impl CollectionStats {
    /// Check if compaction is needed.
    pub fn needs_compaction(&self, threshold: f64) -> bool {
        self.deletion_ratio > threshold
    }
}
