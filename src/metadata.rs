//! Metadata storage keyed by fingerprint.
//!
//! A [`MetadataStore`] keeps one [`MetadataRecord`] per fingerprint, with no
//! knowledge of vectors or slots beyond the core fields it is told about.
//! Backends are chosen with [`MetadataStoreConfig`] through
//! [`MetadataStoreFactory`].
//!
//! # Module Structure
//!
//! - [`record`] - Record type, core field names and validation
//! - [`memory`] - In-memory backend
//! - [`file`] - JSON file backend

pub mod file;
pub mod memory;
pub mod record;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::data::Metadata;
use crate::error::{Result, VdsError};

pub use file::FileMetadataStore;
pub use memory::MemoryMetadataStore;
pub use record::{MetadataRecord, RecordStatus};

/// Default file name of the JSON metadata table.
pub const DEFAULT_METADATA_FILE: &str = "metadata.json";

/// Key-value storage of metadata records.
///
/// Mutating operations on an unknown fingerprint fail with
/// [`VdsError::NotFound`] instead of creating a record.
pub trait MetadataStore: Send + Sync + fmt::Debug {
    /// Create the record for a new fingerprint.
    ///
    /// Core fields in `data` are validated and stored on the record; all other
    /// keys become dynamic fields. Fails with
    /// [`VdsError::DuplicateFingerprint`] if a record exists.
    fn insert_new_vector(&mut self, fingerprint: &str, data: Metadata) -> Result<bool>;

    /// Merge `updates` into an existing record and refresh `updated_at`.
    ///
    /// Returns `false` if `updates` is empty.
    fn bulk_update_fields(&mut self, fingerprint: &str, updates: Metadata) -> Result<bool>;

    fn get_metadata(&self, fingerprint: &str) -> Result<MetadataRecord>;

    /// Remove a record. Returns whether one existed.
    fn delete(&mut self, fingerprint: &str) -> Result<bool>;

    /// Stamp `last_accessed_at`.
    fn touch(&mut self, fingerprint: &str) -> Result<()>;

    fn contains(&self, fingerprint: &str) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All fingerprints with a record, sorted.
    fn fingerprints(&self) -> Vec<String>;

    /// Persist pending changes, if the backend has any storage.
    fn flush(&mut self) -> Result<()>;
}

/// Which metadata backend to use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetadataStoreConfig {
    #[default]
    Memory,
    File { path: PathBuf },
}

impl MetadataStoreConfig {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        MetadataStoreConfig::File { path: path.into() }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            MetadataStoreConfig::File { path } if path.as_os_str().is_empty() => Err(
                VdsError::invalid_config("metadata file path must not be empty"),
            ),
            _ => Ok(()),
        }
    }
}

/// Factory for creating metadata stores.
pub struct MetadataStoreFactory;

impl MetadataStoreFactory {
    pub fn create(config: &MetadataStoreConfig) -> Result<Box<dyn MetadataStore>> {
        config.validate()?;
        match config {
            MetadataStoreConfig::Memory => Ok(Box::new(MemoryMetadataStore::new())),
            MetadataStoreConfig::File { path } => Ok(Box::new(FileMetadataStore::open(path)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serde() {
        let config: MetadataStoreConfig =
            serde_json::from_str(r#"{"type": "file", "path": "/tmp/meta.json"}"#).unwrap();
        assert_eq!(config, MetadataStoreConfig::file("/tmp/meta.json"));

        let config: MetadataStoreConfig = serde_json::from_str(r#"{"type": "memory"}"#).unwrap();
        assert_eq!(config, MetadataStoreConfig::Memory);
    }

    #[test]
    fn test_factory() {
        let store = MetadataStoreFactory::create(&MetadataStoreConfig::Memory).unwrap();
        assert!(store.is_empty());

        let dir = tempfile::tempdir().unwrap();
        let config = MetadataStoreConfig::file(dir.path().join(DEFAULT_METADATA_FILE));
        let store = MetadataStoreFactory::create(&config).unwrap();
        assert_eq!(store.len(), 0);

        assert!(MetadataStoreFactory::create(&MetadataStoreConfig::file("")).is_err());
    }
}
