//! Flat (exhaustive) index over contiguous `f32` storage.
//!
//! Blob format, all integers little-endian:
//!
//! ```text
//! [u32: magic "CVFX"][u32: version]
//! [u8: metric tag][u32: dimension][u64: count]
//! [f32 * dimension * count: vectors in slot order]
//! [u32: crc32 of the vector bytes]
//! ```

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;

use crate::error::{Result, VdsError};
use crate::vector::distance::DistanceMetric;
use crate::vector::index::{IndexKind, SlotHit, VectorIndex};

pub(crate) const FLAT_MAGIC: u32 = 0x4356_4658; // "CVFX"
const FLAT_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    metric: DistanceMetric,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            data: Vec::new(),
        }
    }

    fn row(&self, slot: usize) -> &[f32] {
        let start = slot * self.dimension;
        &self.data[start..start + self.dimension]
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(VdsError::invalid_argument(format!(
                "flat index expects {} components, got {}",
                self.dimension,
                vector.len()
            )));
        }
        Ok(())
    }

    /// Read everything after the magic number.
    pub(crate) fn read_body(input: &mut dyn Read) -> Result<Self> {
        let version = input.read_u32::<LittleEndian>().map_err(truncated)?;
        if version != FLAT_VERSION {
            return Err(VdsError::corrupt(format!(
                "unsupported flat index version: {version}"
            )));
        }

        let metric = DistanceMetric::from_tag(input.read_u8().map_err(truncated)?)?;
        let dimension = input.read_u32::<LittleEndian>().map_err(truncated)? as usize;
        let count = input.read_u64::<LittleEndian>().map_err(truncated)? as usize;
        if dimension == 0 {
            return Err(VdsError::corrupt("flat index has zero dimension"));
        }

        let total = count
            .checked_mul(dimension)
            .ok_or_else(|| VdsError::corrupt("flat index size overflows"))?;
        let mut data = vec![0.0f32; total];
        input
            .read_f32_into::<LittleEndian>(&mut data)
            .map_err(truncated)?;

        let mut hasher = Hasher::new();
        for value in &data {
            hasher.update(&value.to_le_bytes());
        }
        let expected = input.read_u32::<LittleEndian>().map_err(truncated)?;
        if hasher.finalize() != expected {
            return Err(VdsError::corrupt("flat index checksum mismatch"));
        }

        Ok(Self {
            dimension,
            metric,
            data,
        })
    }
}

fn truncated(err: std::io::Error) -> VdsError {
    VdsError::corrupt(format!("truncated index blob: {err}"))
}

impl VectorIndex for FlatIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Flat
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    fn add(&mut self, vector: &[f32]) -> Result<u64> {
        self.check_dimension(vector)?;
        let slot = self.len() as u64;
        self.data.extend_from_slice(vector);
        Ok(slot)
    }

    fn remove_last(&mut self) -> Result<()> {
        let len = self.len();
        if len == 0 {
            return Err(VdsError::invalid_argument("flat index is empty"));
        }
        self.data.truncate((len - 1) * self.dimension);
        Ok(())
    }

    fn reconstruct(&self, slot: u64) -> Result<Vec<f32>> {
        let slot = slot as usize;
        if slot >= self.len() {
            return Err(VdsError::not_found(format!("slot {slot}")));
        }
        Ok(self.row(slot).to_vec())
    }

    fn search(
        &self,
        query: &[f32],
        top_k: usize,
        skip: &dyn Fn(u64) -> bool,
    ) -> Result<Vec<SlotHit>> {
        self.check_dimension(query)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<SlotHit> = (0..self.len())
            .filter(|&slot| !skip(slot as u64))
            .map(|slot| SlotHit {
                slot: slot as u64,
                distance: self.metric.score(query, self.row(slot)),
            })
            .collect();

        let metric = self.metric;
        let order = |a: &SlotHit, b: &SlotHit| {
            metric
                .compare(a.distance, b.distance)
                .then(a.slot.cmp(&b.slot))
        };
        if hits.len() > top_k {
            hits.select_nth_unstable_by(top_k - 1, order);
            hits.truncate(top_k);
        }
        hits.sort_unstable_by(order);
        Ok(hits)
    }

    fn rebuild(&self, surviving: &[u64]) -> Result<Box<dyn VectorIndex>> {
        let len = self.len();
        let mut data = Vec::with_capacity(surviving.len() * self.dimension);
        for &slot in surviving {
            let slot = slot as usize;
            if slot >= len {
                return Err(VdsError::invalid_argument(format!(
                    "slot {slot} out of range for index of {len}"
                )));
            }
            data.extend_from_slice(self.row(slot));
        }
        Ok(Box::new(FlatIndex {
            dimension: self.dimension,
            metric: self.metric,
            data,
        }))
    }

    fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>() + self.data.capacity() * std::mem::size_of::<f32>()
    }

    fn write_to(&self, out: &mut dyn Write) -> Result<()> {
        let dimension = u32::try_from(self.dimension).map_err(|_| {
            VdsError::invalid_argument(format!("dimension {} exceeds u32::MAX", self.dimension))
        })?;

        out.write_u32::<LittleEndian>(FLAT_MAGIC)?;
        out.write_u32::<LittleEndian>(FLAT_VERSION)?;
        out.write_u8(self.metric.to_tag())?;
        out.write_u32::<LittleEndian>(dimension)?;
        out.write_u64::<LittleEndian>(self.len() as u64)?;

        let mut hasher = Hasher::new();
        for value in &self.data {
            let bytes = value.to_le_bytes();
            hasher.update(&bytes);
            out.write_all(&bytes)?;
        }
        out.write_u32::<LittleEndian>(hasher.finalize())?;
        Ok(())
    }
}
