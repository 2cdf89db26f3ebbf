//! Configuration types for [`VectorStore`](super::VectorStore).

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VdsError};
use crate::vector::distance::DistanceMetric;
use crate::vector::index::IndexKind;

/// Default embedding width (OpenAI `text-embedding-3-small` / ada-002).
pub const DEFAULT_DIMENSION: usize = 1536;

/// Default directory for persisted collections.
pub const DEFAULT_STORAGE_DIR: &str = "faiss_storage";

/// Shape of a single collection. Immutable once the collection exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub dimension: usize,
    #[serde(default)]
    pub metric: DistanceMetric,
    #[serde(default)]
    pub kind: IndexKind,
}

impl CollectionConfig {
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            kind: IndexKind::Flat,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(VdsError::invalid_config("collection dimension must be positive"));
        }
        Ok(())
    }
}

/// Configuration for the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Dimension for collections created lazily without an override.
    pub default_dimension: usize,

    /// Metric for collections created lazily without an override.
    pub default_metric: DistanceMetric,

    /// Index backend for collections created lazily without an override.
    pub default_kind: IndexKind,

    /// Per-collection overrides applied when the collection is first created.
    pub collections: HashMap<String, CollectionConfig>,

    /// Directory used by `save_all` / `load_all`. `None` keeps everything in memory.
    pub storage_dir: Option<PathBuf>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            default_dimension: DEFAULT_DIMENSION,
            default_metric: DistanceMetric::Euclidean,
            default_kind: IndexKind::Flat,
            collections: HashMap::new(),
            storage_dir: None,
        }
    }
}

impl VectorStoreConfig {
    pub fn builder() -> VectorStoreConfigBuilder {
        VectorStoreConfigBuilder::default()
    }

    /// Shape a collection named `name` gets when it is created lazily.
    pub fn collection_config(&self, name: &str) -> CollectionConfig {
        self.collections
            .get(name)
            .copied()
            .unwrap_or(CollectionConfig {
                dimension: self.default_dimension,
                metric: self.default_metric,
                kind: self.default_kind,
            })
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_dimension == 0 {
            return Err(VdsError::invalid_config("default_dimension must be positive"));
        }
        for (name, config) in &self.collections {
            config.validate().map_err(|e| {
                VdsError::invalid_config(format!("collection '{name}': {e}"))
            })?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct VectorStoreConfigBuilder {
    config: VectorStoreConfig,
}

impl VectorStoreConfigBuilder {
    pub fn default_dimension(mut self, dimension: usize) -> Self {
        self.config.default_dimension = dimension;
        self
    }

    pub fn default_metric(mut self, metric: DistanceMetric) -> Self {
        self.config.default_metric = metric;
        self
    }

    pub fn collection(mut self, name: impl Into<String>, config: CollectionConfig) -> Self {
        self.config.collections.insert(name.into(), config);
        self
    }

    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> VectorStoreConfig {
        self.config
    }
}
