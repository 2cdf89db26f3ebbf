//! A single named collection: one physical index plus its fingerprint map.

use std::fmt;

use crate::error::{Result, VdsError};
use crate::vector::fingerprint::FingerprintIndex;
use crate::vector::index::{VectorIndex, create_index};
use crate::vector::store::config::CollectionConfig;
use crate::vector::store::response::{CollectionStats, PurgeOutcome, SearchHit, SlotMove};

pub struct Collection {
    name: String,
    config: CollectionConfig,
    index: Box<dyn VectorIndex>,
    fingerprints: FingerprintIndex,
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("slots", &self.fingerprints.len())
            .field("deleted", &self.fingerprints.deleted_len())
            .finish()
    }
}

impl Collection {
    pub fn new(name: impl Into<String>, config: CollectionConfig) -> Result<Self> {
        config.validate()?;
        let index = create_index(config.kind, config.dimension, config.metric)?;
        Ok(Self {
            name: name.into(),
            config,
            index,
            fingerprints: FingerprintIndex::new(),
        })
    }

    /// Assemble a collection from loaded parts, checking they belong together.
    pub(crate) fn from_parts(
        name: impl Into<String>,
        index: Box<dyn VectorIndex>,
        fingerprints: FingerprintIndex,
    ) -> Result<Self> {
        let name = name.into();
        if index.len() != fingerprints.len() {
            return Err(VdsError::corrupt(format!(
                "collection '{name}': index holds {} vectors but the fingerprint map has {} slots",
                index.len(),
                fingerprints.len()
            )));
        }
        let config = CollectionConfig {
            dimension: index.dimension(),
            metric: index.metric(),
            kind: index.kind(),
        };
        Ok(Self {
            name,
            config,
            index,
            fingerprints,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    pub(crate) fn index(&self) -> &dyn VectorIndex {
        self.index.as_ref()
    }

    pub(crate) fn fingerprints(&self) -> &FingerprintIndex {
        &self.fingerprints
    }

    pub(crate) fn validate_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.config.dimension {
            return Err(VdsError::dimension_mismatch(
                &self.name,
                self.config.dimension,
                vector.len(),
            ));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(VdsError::invalid_argument(format!(
                "vector for collection '{}' contains non-finite values",
                self.name
            )));
        }
        Ok(())
    }

    /// Append `vector` under `fingerprint`, returning its slot.
    pub fn add(&mut self, fingerprint: &str, vector: &[f32]) -> Result<u64> {
        self.validate_vector(vector)?;

        let slot = self.fingerprints.assign(fingerprint)?;
        let index_slot = match self.index.add(vector) {
            Ok(slot) => slot,
            Err(e) => {
                self.fingerprints.unassign_last(fingerprint)?;
                return Err(e);
            }
        };

        if slot != index_slot {
            return Err(VdsError::consistency(format!(
                "collection '{}': fingerprint map assigned slot {slot} but index used slot {index_slot}",
                self.name
            )));
        }
        Ok(slot)
    }

    /// Undo the most recent [`add`](Self::add) of `fingerprint`.
    pub fn rollback_add(&mut self, fingerprint: &str) -> Result<()> {
        let slot = self.fingerprints.resolve(fingerprint)?;
        if slot as usize + 1 != self.index.len() {
            return Err(VdsError::consistency(format!(
                "collection '{}': cannot roll back '{fingerprint}', it is not the newest slot",
                self.name
            )));
        }
        self.fingerprints.unassign_last(fingerprint)?;
        self.index.remove_last()
    }

    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        self.validate_vector(query)?;
        let fingerprints = &self.fingerprints;
        let hits = self
            .index
            .search(query, top_k, &|slot| fingerprints.is_slot_deleted(slot))?;

        hits.into_iter()
            .map(|hit| {
                Ok(SearchHit {
                    fingerprint: fingerprints.invert(hit.slot)?.to_string(),
                    distance: hit.distance,
                })
            })
            .collect()
    }

    /// Every live hit, best first. Used when results are filtered afterwards.
    pub fn search_all(&self, query: &[f32]) -> Result<Vec<SearchHit>> {
        self.search(query, self.fingerprints.live_len())
    }

    pub fn get(&self, fingerprint: &str) -> Result<Vec<f32>> {
        let slot = self.fingerprints.resolve(fingerprint)?;
        self.index.reconstruct(slot)
    }

    pub fn slot_of(&self, fingerprint: &str) -> Result<u64> {
        self.fingerprints.resolve(fingerprint)
    }

    /// `Some(deleted)` for a known fingerprint.
    pub fn lookup(&self, fingerprint: &str) -> Option<bool> {
        self.fingerprints.lookup(fingerprint).map(|(_, deleted)| deleted)
    }

    pub fn remove(&mut self, fingerprint: &str) -> Result<bool> {
        self.fingerprints.mark_deleted(fingerprint)
    }

    /// Physically drop soft-deleted slots.
    ///
    /// The replacement index and fingerprint map are built and checked before
    /// either is installed. If anything fails the collection is unchanged.
    pub fn purge(&mut self) -> Result<PurgeOutcome> {
        if self.fingerprints.deleted_len() == 0 {
            return Ok(PurgeOutcome::unchanged(&self.name, self.fingerprints.len()));
        }

        let survivors = self.fingerprints.live_slots();
        let new_index = self.index.rebuild(&survivors)?;
        let mut new_fingerprints = self.fingerprints.clone();
        let remap = new_fingerprints.compact(&survivors)?;

        if new_index.len() != new_fingerprints.len() {
            return Err(VdsError::consistency(format!(
                "collection '{}': rebuilt index has {} vectors, fingerprint map has {}",
                self.name,
                new_index.len(),
                new_fingerprints.len()
            )));
        }

        let mut moved = Vec::new();
        for (old_slot, new_slot) in remap {
            if old_slot != new_slot {
                moved.push(SlotMove {
                    fingerprint: new_fingerprints.invert(new_slot)?.to_string(),
                    old_slot,
                    new_slot,
                });
            }
        }

        // A fingerprint re-added after a soft delete leaves a dead slot behind
        // but its record lives on, so it is not reported as purged.
        let mut purged = Vec::new();
        for entry in self.fingerprints.to_entries() {
            if entry.deleted && new_fingerprints.resolve(&entry.fingerprint).is_err() {
                purged.push(entry.fingerprint);
            }
        }

        let slots_before = self.fingerprints.len();
        self.index = new_index;
        self.fingerprints = new_fingerprints;

        Ok(PurgeOutcome {
            collection: self.name.clone(),
            purged,
            moved,
            slots_before,
            remaining: self.fingerprints.len(),
        })
    }

    pub fn count(&self, include_deleted: bool) -> usize {
        if include_deleted {
            self.fingerprints.len()
        } else {
            self.fingerprints.live_len()
        }
    }

    pub fn list(&self, include_deleted: bool) -> Vec<String> {
        self.fingerprints.fingerprints(include_deleted)
    }

    pub fn stats(&self) -> CollectionStats {
        let total = self.fingerprints.len();
        let deleted = self.fingerprints.deleted_len();
        CollectionStats {
            name: self.name.clone(),
            dimension: self.config.dimension,
            metric: self.config.metric,
            kind: self.config.kind,
            total_slots: total,
            live: total - deleted,
            deleted,
            deletion_ratio: if total == 0 {
                0.0
            } else {
                deleted as f64 / total as f64
            },
            memory_bytes: self.index.memory_usage(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::distance::DistanceMetric;

    fn collection() -> Collection {
        Collection::new("docs", CollectionConfig::new(2, DistanceMetric::Euclidean)).unwrap()
    }

    #[test]
    fn test_add_rejects_non_finite() {
        let mut c = collection();
        let err = c.add("a", &[f32::NAN, 0.0]).unwrap_err();
        assert!(matches!(err, VdsError::InvalidArgument(_)));
        assert_eq!(c.count(true), 0);
    }

    #[test]
    fn test_rollback_add() {
        let mut c = collection();
        c.add("a", &[1.0, 0.0]).unwrap();
        c.add("b", &[0.0, 1.0]).unwrap();
        assert!(c.rollback_add("a").is_err());
        c.rollback_add("b").unwrap();
        assert_eq!(c.count(true), 1);
        assert!(c.get("b").is_err());
        assert_eq!(c.index().len(), 1);
    }

    #[test]
    fn test_purge_without_deletions_is_noop() {
        let mut c = collection();
        c.add("a", &[1.0, 0.0]).unwrap();
        let outcome = c.purge().unwrap();
        assert!(outcome.purged.is_empty());
        assert!(outcome.moved.is_empty());
        assert_eq!(outcome.remaining, 1);
    }

    #[test]
    fn test_purge_keeps_readded_fingerprint() {
        let mut c = collection();
        c.add("a", &[1.0, 0.0]).unwrap();
        c.remove("a").unwrap();
        c.add("a", &[0.0, 1.0]).unwrap();

        let outcome = c.purge().unwrap();
        assert!(outcome.purged.is_empty());
        assert_eq!(outcome.moved.len(), 1);
        assert_eq!(c.get("a").unwrap(), vec![0.0, 1.0]);
        assert_eq!(c.count(true), 1);
    }

    #[test]
    fn test_stats() {
        let mut c = collection();
        c.add("a", &[1.0, 0.0]).unwrap();
        c.add("b", &[0.0, 1.0]).unwrap();
        c.remove("a").unwrap();
        let stats = c.stats();
        assert_eq!(stats.total_slots, 2);
        assert_eq!(stats.live, 1);
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.deletion_ratio, 0.5);
    }
}
