//! # citadel-vds
//!
//! Fingerprint-keyed vector collections with paired metadata records.
//!
//! ## Features
//!
//! - Named collections with fixed dimension and metric, created on first use
//! - Exact flat search (squared L2 or inner product) with SIMD kernels
//! - Soft deletion with explicit purge/compaction that renumbers slots
//! - Metadata records with core fields and an open bag of dynamic fields
//! - Atomic add across the vector and metadata stores
//! - Paired, checksummed on-disk persistence
//!
//! ```
//! use citadel_vds::{
//!     CollectionConfig, DeletionConfig, DistanceMetric, MemoryMetadataStore, Metadata,
//!     VectorIndexManager, VectorStore, VectorStoreConfig,
//! };
//!
//! let config = VectorStoreConfig::builder()
//!     .collection("docs", CollectionConfig::new(4, DistanceMetric::Euclidean))
//!     .build();
//! let mut manager = VectorIndexManager::new(
//!     VectorStore::new(config).unwrap(),
//!     Box::new(MemoryMetadataStore::new()),
//!     DeletionConfig::default(),
//! );
//!
//! manager.add_vector("docs", "a", &[1.0, 0.0, 0.0, 0.0], Metadata::new()).unwrap();
//! let hits = manager.search_vectors("docs", &[1.0, 0.0, 0.0, 0.0], 1, false).unwrap();
//! assert_eq!(hits[0].fingerprint, "a");
//! ```

// Core modules
pub mod config;
mod data;
mod error;
pub mod manager;
pub mod metadata;
pub mod vector;

// Re-exports for the public API
pub use config::{DeletionConfig, ManagerConfig};
pub use data::{DataValue, Metadata, metadata_from};
pub use error::{Result, VdsError};
pub use manager::{HealthReport, SearchResult, SharedIndexManager, VectorIndexManager};
pub use metadata::{
    FileMetadataStore, MemoryMetadataStore, MetadataRecord, MetadataStore, MetadataStoreConfig,
    MetadataStoreFactory, RecordStatus,
};
pub use vector::{
    CollectionConfig, CollectionStats, DistanceMetric, FingerprintIndex, PurgeOutcome, SearchHit,
    VectorStore, VectorStoreConfig,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
