//! Configuration for [`VectorIndexManager`](crate::manager::VectorIndexManager).
//!
//! Everything is plain serde data with defaults, so a partial JSON document
//! is a valid configuration:
//!
//! ```
//! use citadel_vds::ManagerConfig;
//!
//! let config = ManagerConfig::from_json_str(r#"{ "vector": { "default_dimension": 8 } }"#).unwrap();
//! assert_eq!(config.vector.default_dimension, 8);
//! assert_eq!(config.deletion.compaction_threshold, 0.3);
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VdsError};
use crate::metadata::{DEFAULT_METADATA_FILE, MetadataStoreConfig};
use crate::vector::store::config::{DEFAULT_STORAGE_DIR, VectorStoreConfig};

/// When soft-deleted slots are physically purged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeletionConfig {
    /// Deletion ratio (0.0-1.0) above which a collection needs compaction.
    pub compaction_threshold: f64,

    /// Purge a collection right after a removal pushes it over the threshold.
    pub auto_purge: bool,
}

impl Default for DeletionConfig {
    fn default() -> Self {
        DeletionConfig {
            compaction_threshold: 0.3,
            auto_purge: false,
        }
    }
}

impl DeletionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.compaction_threshold) {
            return Err(VdsError::invalid_config(format!(
                "compaction_threshold must be within [0, 1], got {}",
                self.compaction_threshold
            )));
        }
        Ok(())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub vector: VectorStoreConfig,
    pub metadata: MetadataStoreConfig,
    pub deletion: DeletionConfig,

    /// Stamp `last_accessed_at` when a vector is read back.
    pub track_access: bool,
}

impl ManagerConfig {
    /// Everything persisted under `dir`: collection files plus `metadata.json`.
    pub fn on_disk(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        ManagerConfig {
            metadata: MetadataStoreConfig::file(dir.join(DEFAULT_METADATA_FILE)),
            vector: VectorStoreConfig {
                storage_dir: Some(dir),
                ..VectorStoreConfig::default()
            },
            ..ManagerConfig::default()
        }
    }

    /// [`on_disk`](Self::on_disk) with the default `faiss_storage` directory.
    pub fn default_on_disk() -> Self {
        Self::on_disk(DEFAULT_STORAGE_DIR)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ManagerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        self.vector.validate()?;
        self.metadata.validate()?;
        self.deletion.validate()
    }
}
