//! Bidirectional fingerprint ↔ slot mapping for one collection.
//!
//! Slots are dense positions `0..len` in the physical index. Every slot
//! remembers the fingerprint it was assigned to and a deleted flag; the
//! forward map points each fingerprint at its newest slot. The mapping is a
//! bijection over live slots. Dead slots stay in place (and keep their
//! position) until [`FingerprintIndex::compact`] renumbers the survivors.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VdsError};

/// Persisted form of a single slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotEntry {
    pub slot: u64,
    pub fingerprint: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone)]
struct Slot {
    fingerprint: String,
    deleted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FingerprintIndex {
    by_fingerprint: AHashMap<String, u64>,
    slots: Vec<Slot>,
    deleted_count: usize,
}

impl FingerprintIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next slot to `fingerprint`.
    ///
    /// A fingerprint whose current slot is soft-deleted may be assigned again;
    /// the old slot becomes an orphan that the next compaction drops.
    pub fn assign(&mut self, fingerprint: &str) -> Result<u64> {
        if let Some(&slot) = self.by_fingerprint.get(fingerprint) {
            if !self.slots[slot as usize].deleted {
                return Err(VdsError::duplicate(fingerprint));
            }
        }

        let slot = self.slots.len() as u64;
        self.slots.push(Slot {
            fingerprint: fingerprint.to_string(),
            deleted: false,
        });
        self.by_fingerprint.insert(fingerprint.to_string(), slot);
        Ok(slot)
    }

    /// Slot of a live fingerprint.
    pub fn resolve(&self, fingerprint: &str) -> Result<u64> {
        match self.lookup(fingerprint) {
            Some((slot, false)) => Ok(slot),
            _ => Err(VdsError::not_found(format!("fingerprint '{fingerprint}'"))),
        }
    }

    /// Slot and deleted flag, including soft-deleted fingerprints.
    pub fn lookup(&self, fingerprint: &str) -> Option<(u64, bool)> {
        self.by_fingerprint
            .get(fingerprint)
            .map(|&slot| (slot, self.slots[slot as usize].deleted))
    }

    /// Fingerprint stored at `slot`.
    pub fn invert(&self, slot: u64) -> Result<&str> {
        self.slots
            .get(slot as usize)
            .map(|s| s.fingerprint.as_str())
            .ok_or_else(|| VdsError::not_found(format!("slot {slot}")))
    }

    pub fn is_slot_deleted(&self, slot: u64) -> bool {
        self.slots
            .get(slot as usize)
            .map(|s| s.deleted)
            .unwrap_or(true)
    }

    /// Mark a fingerprint deleted. Returns `false` if it already was.
    pub fn mark_deleted(&mut self, fingerprint: &str) -> Result<bool> {
        let slot = *self
            .by_fingerprint
            .get(fingerprint)
            .ok_or_else(|| VdsError::not_found(format!("fingerprint '{fingerprint}'")))?;

        let entry = &mut self.slots[slot as usize];
        if entry.deleted {
            return Ok(false);
        }
        entry.deleted = true;
        self.deleted_count += 1;
        Ok(true)
    }

    /// Undo the most recent [`assign`](Self::assign) of `fingerprint`.
    ///
    /// Only the last slot can be released; anything else would shift the
    /// slots of other fingerprints.
    pub fn unassign_last(&mut self, fingerprint: &str) -> Result<()> {
        let last = self
            .slots
            .len()
            .checked_sub(1)
            .ok_or_else(|| VdsError::not_found(format!("fingerprint '{fingerprint}'")))?;

        if self.slots[last].fingerprint != fingerprint || self.slots[last].deleted {
            return Err(VdsError::invalid_argument(format!(
                "fingerprint '{fingerprint}' does not own the last slot"
            )));
        }

        self.slots.pop();
        self.by_fingerprint.remove(fingerprint);

        // A previously soft-deleted assignment of the same fingerprint becomes
        // visible again.
        if let Some(pos) = self
            .slots
            .iter()
            .rposition(|s| s.fingerprint == fingerprint)
        {
            self.by_fingerprint.insert(fingerprint.to_string(), pos as u64);
        }
        Ok(())
    }

    /// Renumber `surviving` slots to `0..surviving.len()`, preserving order.
    ///
    /// Returns `(old_slot, new_slot)` pairs for every survivor. Slots not
    /// listed are dropped together with their fingerprints.
    pub fn compact(&mut self, surviving: &[u64]) -> Result<Vec<(u64, u64)>> {
        let mut remap = Vec::with_capacity(surviving.len());
        let mut slots = Vec::with_capacity(surviving.len());
        let mut by_fingerprint = AHashMap::with_capacity(surviving.len());
        let mut live = AHashSet::with_capacity(surviving.len());
        let mut deleted_count = 0;
        let mut previous: Option<u64> = None;

        for (new_slot, &old_slot) in surviving.iter().enumerate() {
            if previous.is_some_and(|p| p >= old_slot) {
                return Err(VdsError::invalid_argument(
                    "surviving slots must be strictly ascending",
                ));
            }
            previous = Some(old_slot);

            let entry = self
                .slots
                .get(old_slot as usize)
                .ok_or_else(|| VdsError::invalid_argument(format!("slot {old_slot} out of range")))?
                .clone();

            let new_slot = new_slot as u64;
            if entry.deleted {
                deleted_count += 1;
                if !live.contains(&entry.fingerprint) {
                    by_fingerprint.insert(entry.fingerprint.clone(), new_slot);
                }
            } else {
                if !live.insert(entry.fingerprint.clone()) {
                    return Err(VdsError::consistency(format!(
                        "fingerprint '{}' is live in two slots",
                        entry.fingerprint
                    )));
                }
                by_fingerprint.insert(entry.fingerprint.clone(), new_slot);
            }
            slots.push(entry);
            remap.push((old_slot, new_slot));
        }

        self.slots = slots;
        self.by_fingerprint = by_fingerprint;
        self.deleted_count = deleted_count;
        Ok(remap)
    }

    /// Slots that are not deleted, ascending.
    pub fn live_slots(&self) -> Vec<u64> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.deleted)
            .map(|(i, _)| i as u64)
            .collect()
    }

    pub fn deleted_slots(&self) -> Vec<u64> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.deleted)
            .map(|(i, _)| i as u64)
            .collect()
    }

    /// Fingerprints in slot order.
    pub fn fingerprints(&self, include_deleted: bool) -> Vec<String> {
        self.slots
            .iter()
            .filter(|s| include_deleted || !s.deleted)
            .map(|s| s.fingerprint.clone())
            .collect()
    }

    /// Total number of slots, live and dead.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn live_len(&self) -> usize {
        self.slots.len() - self.deleted_count
    }

    pub fn deleted_len(&self) -> usize {
        self.deleted_count
    }

    pub fn to_entries(&self) -> Vec<SlotEntry> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, s)| SlotEntry {
                slot: i as u64,
                fingerprint: s.fingerprint.clone(),
                deleted: s.deleted,
            })
            .collect()
    }

    /// Rebuild from persisted entries.
    ///
    /// Entries must be ordered with slots `0..N-1` and no fingerprint may be
    /// live in more than one slot.
    pub fn from_entries(entries: Vec<SlotEntry>) -> Result<Self> {
        let mut index = FingerprintIndex::new();
        for (expected, entry) in entries.into_iter().enumerate() {
            if entry.slot != expected as u64 {
                return Err(VdsError::corrupt(format!(
                    "slot ids are not contiguous: expected {expected}, found {}",
                    entry.slot
                )));
            }
            match index.lookup(&entry.fingerprint) {
                Some((_, false)) if !entry.deleted => {
                    return Err(VdsError::corrupt(format!(
                        "fingerprint '{}' is live in more than one slot",
                        entry.fingerprint
                    )));
                }
                Some((_, false)) => {
                    // Keep the forward map on the live slot.
                    index.slots.push(Slot {
                        fingerprint: entry.fingerprint,
                        deleted: true,
                    });
                    index.deleted_count += 1;
                    continue;
                }
                _ => {}
            }
            index
                .by_fingerprint
                .insert(entry.fingerprint.clone(), entry.slot);
            if entry.deleted {
                index.deleted_count += 1;
            }
            index.slots.push(Slot {
                fingerprint: entry.fingerprint,
                deleted: entry.deleted,
            });
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(fps: &[&str]) -> FingerprintIndex {
        let mut index = FingerprintIndex::new();
        for fp in fps {
            index.assign(fp).unwrap();
        }
        index
    }

    #[test]
    fn test_assign_and_bijection() {
        let index = index_with(&["a", "b", "c"]);
        for fp in ["a", "b", "c"] {
            let slot = index.resolve(fp).unwrap();
            assert_eq!(index.invert(slot).unwrap(), fp);
        }
        assert_eq!(index.len(), 3);
        assert_eq!(index.live_len(), 3);
    }

    #[test]
    fn test_duplicate_assign_fails() {
        let mut index = index_with(&["a"]);
        let err = index.assign("a").unwrap_err();
        assert!(matches!(err, VdsError::DuplicateFingerprint { .. }));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_mark_deleted_is_idempotent() {
        let mut index = index_with(&["a", "b"]);
        assert!(index.mark_deleted("a").unwrap());
        assert!(!index.mark_deleted("a").unwrap());
        assert_eq!(index.deleted_len(), 1);
        assert_eq!(index.live_len(), 1);
        assert!(index.resolve("a").is_err());
        assert_eq!(index.lookup("a"), Some((0, true)));
    }

    #[test]
    fn test_mark_deleted_unknown() {
        let mut index = FingerprintIndex::new();
        assert!(matches!(index.mark_deleted("x"), Err(VdsError::NotFound(_))));
    }

    #[test]
    fn test_reassign_soft_deleted() {
        let mut index = index_with(&["a", "b"]);
        index.mark_deleted("a").unwrap();
        let slot = index.assign("a").unwrap();
        assert_eq!(slot, 2);
        assert_eq!(index.resolve("a").unwrap(), 2);
        assert!(index.is_slot_deleted(0));
        assert_eq!(index.live_len(), 2);
    }

    #[test]
    fn test_compact_renumbers_survivors() {
        let mut index = index_with(&["f1", "f2", "f3", "f4", "f5"]);
        index.mark_deleted("f2").unwrap();
        index.mark_deleted("f4").unwrap();

        let survivors = index.live_slots();
        assert_eq!(survivors, vec![0, 2, 4]);
        assert_eq!(index.deleted_slots(), vec![1, 3]);

        let remap = index.compact(&survivors).unwrap();
        assert_eq!(remap, vec![(0, 0), (2, 1), (4, 2)]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.deleted_len(), 0);
        assert_eq!(index.resolve("f3").unwrap(), 1);
        assert_eq!(index.resolve("f5").unwrap(), 2);
        assert!(index.lookup("f2").is_none());
        assert!(index.lookup("f4").is_none());
    }

    #[test]
    fn test_compact_rejects_unordered_input() {
        let mut index = index_with(&["a", "b", "c"]);
        assert!(index.compact(&[2, 0]).is_err());
        assert!(index.compact(&[0, 7]).is_err());
        // Failed compaction leaves the index untouched.
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_unassign_last_restores_previous_assignment() {
        let mut index = index_with(&["a"]);
        index.mark_deleted("a").unwrap();
        index.assign("a").unwrap();
        index.unassign_last("a").unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup("a"), Some((0, true)));
    }

    #[test]
    fn test_unassign_requires_last_slot() {
        let mut index = index_with(&["a", "b"]);
        assert!(index.unassign_last("a").is_err());
        index.unassign_last("b").unwrap();
        assert!(index.lookup("b").is_none());
    }

    #[test]
    fn test_entries_roundtrip_with_dead_slots() {
        let mut index = index_with(&["a", "b"]);
        index.mark_deleted("a").unwrap();
        index.assign("a").unwrap();

        let restored = FingerprintIndex::from_entries(index.to_entries()).unwrap();
        assert_eq!(restored.len(), 3);
        assert_eq!(restored.resolve("a").unwrap(), 2);
        assert_eq!(restored.deleted_len(), 1);
    }

    #[test]
    fn test_from_entries_rejects_gaps() {
        let entries = vec![
            SlotEntry { slot: 0, fingerprint: "a".into(), deleted: false },
            SlotEntry { slot: 2, fingerprint: "b".into(), deleted: false },
        ];
        assert!(matches!(
            FingerprintIndex::from_entries(entries),
            Err(VdsError::CorruptPersistedState(_))
        ));
    }
}
