//! Physical, slot-addressed vector indexes.
//!
//! A [`VectorIndex`] knows nothing about fingerprints: it stores vectors in
//! insertion order and addresses them by dense slot ids. The collection layer
//! in [`crate::vector::store`] owns the fingerprint mapping and decides which
//! slots are visible.

pub mod flat;

use std::fmt;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VdsError};
use crate::vector::distance::DistanceMetric;

use self::flat::FlatIndex;

/// Backend used for a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Exhaustive exact search over contiguous storage.
    #[default]
    Flat,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Flat => write!(f, "flat"),
        }
    }
}

/// A scored slot returned by [`VectorIndex::search`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotHit {
    pub slot: u64,
    pub distance: f32,
}

/// Slot-addressed similarity index.
pub trait VectorIndex: Send + Sync + fmt::Debug {
    fn kind(&self) -> IndexKind;

    fn dimension(&self) -> usize;

    fn metric(&self) -> DistanceMetric;

    /// Number of stored slots, including slots the caller considers deleted.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a vector and return its slot.
    fn add(&mut self, vector: &[f32]) -> Result<u64>;

    /// Drop the most recently added vector.
    fn remove_last(&mut self) -> Result<()>;

    /// Copy of the vector stored at `slot`.
    fn reconstruct(&self, slot: u64) -> Result<Vec<f32>>;

    /// Best `top_k` slots for `query`, skipping slots for which `skip` is true.
    ///
    /// Hits are ordered best first; equal scores are ordered by ascending slot.
    fn search(
        &self,
        query: &[f32],
        top_k: usize,
        skip: &dyn Fn(u64) -> bool,
    ) -> Result<Vec<SlotHit>>;

    /// Build a new index holding only `surviving` slots, in the given order.
    /// `self` is left untouched.
    fn rebuild(&self, surviving: &[u64]) -> Result<Box<dyn VectorIndex>>;

    /// Approximate heap usage in bytes.
    fn memory_usage(&self) -> usize;

    /// Serialize the index blob.
    fn write_to(&self, out: &mut dyn Write) -> Result<()>;
}

/// Create an empty index of the requested kind.
pub fn create_index(
    kind: IndexKind,
    dimension: usize,
    metric: DistanceMetric,
) -> Result<Box<dyn VectorIndex>> {
    if dimension == 0 {
        return Err(VdsError::invalid_config("vector dimension must be positive"));
    }
    match kind {
        IndexKind::Flat => Ok(Box::new(FlatIndex::new(dimension, metric))),
    }
}

/// Read an index blob written by [`VectorIndex::write_to`].
pub fn read_index(input: &mut dyn Read) -> Result<Box<dyn VectorIndex>> {
    let magic = input
        .read_u32::<LittleEndian>()
        .map_err(|e| VdsError::corrupt(format!("failed to read index header: {e}")))?;
    match magic {
        flat::FLAT_MAGIC => Ok(Box::new(FlatIndex::read_body(input)?)),
        other => Err(VdsError::corrupt(format!(
            "unknown index magic {other:#010x}"
        ))),
    }
}
