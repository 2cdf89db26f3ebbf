//! Distance kernels for exact search.
//!
//! Two metrics are supported:
//!
//! - [`DistanceMetric::Euclidean`] reports the **squared** L2 distance. Smaller
//!   is closer; identical vectors score `0.0`.
//! - [`DistanceMetric::InnerProduct`] reports the raw dot product. Larger is
//!   closer.
//!
//! Both kernels process eight lanes at a time with `wide::f32x8` and finish
//! the tail with scalar arithmetic.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use wide::f32x8;

use crate::error::{Result, VdsError};

const LANES: usize = 8;

/// Distance metric fixed per collection at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared Euclidean distance.
    #[default]
    Euclidean,
    /// Inner (dot) product.
    InnerProduct,
}

impl DistanceMetric {
    /// Score `query` against `stored` under this metric.
    pub fn score(&self, query: &[f32], stored: &[f32]) -> f32 {
        match self {
            DistanceMetric::Euclidean => squared_l2(query, stored),
            DistanceMetric::InnerProduct => dot(query, stored),
        }
    }

    /// Order two scores so that the better one comes first.
    pub fn compare(&self, a: f32, b: f32) -> Ordering {
        match self {
            DistanceMetric::Euclidean => a.total_cmp(&b),
            DistanceMetric::InnerProduct => b.total_cmp(&a),
        }
    }

    /// Stable on-disk tag.
    pub(crate) fn to_tag(self) -> u8 {
        match self {
            DistanceMetric::Euclidean => 0,
            DistanceMetric::InnerProduct => 1,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(DistanceMetric::Euclidean),
            1 => Ok(DistanceMetric::InnerProduct),
            other => Err(VdsError::corrupt(format!("unknown metric tag {other}"))),
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMetric::Euclidean => write!(f, "L2"),
            DistanceMetric::InnerProduct => write!(f, "IP"),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = VdsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "L2" | "EUCLIDEAN" => Ok(DistanceMetric::Euclidean),
            "IP" | "INNER_PRODUCT" | "DOT" => Ok(DistanceMetric::InnerProduct),
            other => Err(VdsError::invalid_config(format!(
                "unknown distance metric '{other}'"
            ))),
        }
    }
}

#[inline]
fn load(chunk: &[f32]) -> f32x8 {
    let mut lanes = [0.0f32; LANES];
    lanes.copy_from_slice(chunk);
    f32x8::new(lanes)
}

/// Squared Euclidean distance between two equal-length slices.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vector dimensions must match");

    let mut sum = f32x8::ZERO;
    let a_chunks = a.chunks_exact(LANES);
    let b_chunks = b.chunks_exact(LANES);
    let a_tail = a_chunks.remainder();
    let b_tail = b_chunks.remainder();

    for (ca, cb) in a_chunks.zip(b_chunks) {
        let diff = load(ca) - load(cb);
        sum += diff * diff;
    }

    let mut total = sum.reduce_add();
    for (x, y) in a_tail.iter().zip(b_tail) {
        let diff = x - y;
        total += diff * diff;
    }
    total
}

/// Dot product of two equal-length slices.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vector dimensions must match");

    let mut sum = f32x8::ZERO;
    let a_chunks = a.chunks_exact(LANES);
    let b_chunks = b.chunks_exact(LANES);
    let a_tail = a_chunks.remainder();
    let b_tail = b_chunks.remainder();

    for (ca, cb) in a_chunks.zip(b_chunks) {
        sum += load(ca) * load(cb);
    }

    let mut total = sum.reduce_add();
    for (x, y) in a_tail.iter().zip(b_tail) {
        total += x * y;
    }
    total
}
