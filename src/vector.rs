//! Vector storage: distance kernels, physical indexes, fingerprint mapping and
//! the per-collection store built on top of them.
//!
//! # Module Structure
//!
//! - `distance`: Distance metrics and SIMD kernels
//! - `fingerprint`: Fingerprint ↔ slot bijection with soft-delete flags
//! - `index`: Slot-addressed index trait and the flat implementation
//! - `store`: Named collections, purge and persistence

pub mod distance;
pub mod fingerprint;
pub mod index;
pub mod store;

// Re-exports
pub use distance::DistanceMetric;
pub use fingerprint::{FingerprintIndex, SlotEntry};
pub use index::flat::FlatIndex;
pub use index::{IndexKind, SlotHit, VectorIndex};
pub use store::VectorStore;
pub use store::config::{CollectionConfig, VectorStoreConfig};
pub use store::response::{CollectionStats, PurgeOutcome, SearchHit, SlotMove};
