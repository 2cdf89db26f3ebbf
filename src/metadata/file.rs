//! JSON-file metadata table.
//!
//! All records live in memory and are written to a single JSON file only on
//! [`flush`](MetadataStore::flush). The file is replaced atomically. Unflushed
//! changes are discarded on drop, so the table on disk never runs ahead of the
//! vector snapshot it was committed with.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::Metadata;
use crate::error::{Result, VdsError};
use crate::metadata::MetadataStore;
use crate::metadata::memory::MemoryMetadataStore;
use crate::metadata::record::MetadataRecord;
use crate::vector::store::snapshot::write_atomic;

const METADATA_FILE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct MetadataTableFile<R> {
    version: u32,
    records: Vec<R>,
}

#[derive(Debug)]
pub struct FileMetadataStore {
    path: PathBuf,
    table: MemoryMetadataStore,
    dirty: bool,
}

impl FileMetadataStore {
    /// Open the table at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let table = if path.exists() {
            let bytes = fs::read(&path)?;
            if bytes.is_empty() {
                MemoryMetadataStore::new()
            } else {
                let file: MetadataTableFile<MetadataRecord> = serde_json::from_slice(&bytes)
                    .map_err(|e| {
                        VdsError::corrupt(format!(
                            "unreadable metadata table {}: {e}",
                            path.display()
                        ))
                    })?;
                if file.version != METADATA_FILE_VERSION {
                    return Err(VdsError::corrupt(format!(
                        "metadata table version mismatch: expected {METADATA_FILE_VERSION}, found {}",
                        file.version
                    )));
                }
                MemoryMetadataStore::from_records(file.records)
            }
        } else {
            MemoryMetadataStore::new()
        };
        log::info!(
            "opened metadata table {} ({} records)",
            path.display(),
            table.len()
        );
        Ok(Self {
            path,
            table,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mark<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_ok() {
            self.dirty = true;
        }
        result
    }
}

impl MetadataStore for FileMetadataStore {
    fn insert_new_vector(&mut self, fingerprint: &str, data: Metadata) -> Result<bool> {
        let result = self.table.insert_new_vector(fingerprint, data);
        self.mark(result)
    }

    fn bulk_update_fields(&mut self, fingerprint: &str, updates: Metadata) -> Result<bool> {
        let result = self.table.bulk_update_fields(fingerprint, updates);
        self.mark(result)
    }

    fn get_metadata(&self, fingerprint: &str) -> Result<MetadataRecord> {
        self.table.get_metadata(fingerprint)
    }

    fn delete(&mut self, fingerprint: &str) -> Result<bool> {
        let removed = self.table.delete(fingerprint)?;
        self.dirty |= removed;
        Ok(removed)
    }

    fn touch(&mut self, fingerprint: &str) -> Result<()> {
        let result = self.table.touch(fingerprint);
        self.mark(result)
    }

    fn contains(&self, fingerprint: &str) -> bool {
        self.table.contains(fingerprint)
    }

    fn len(&self) -> usize {
        self.table.len()
    }

    fn fingerprints(&self) -> Vec<String> {
        self.table.fingerprints()
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let file = MetadataTableFile {
            version: METADATA_FILE_VERSION,
            records: self.table.records_sorted(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;
        write_atomic(&self.path, &bytes)?;
        self.dirty = false;
        log::debug!(
            "flushed {} metadata records to {}",
            self.table.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataValue, metadata_from};

    #[test]
    fn test_flush_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");

        let mut store = FileMetadataStore::open(&path).unwrap();
        store
            .insert_new_vector("f1", metadata_from([("tags", DataValue::from(vec!["x", "y"]))]))
            .unwrap();
        store.insert_new_vector("f2", Metadata::new()).unwrap();
        store.delete("f2").unwrap();
        store.flush().unwrap();
        drop(store);

        let reopened = FileMetadataStore::open(&path).unwrap();
        assert_eq!(reopened.fingerprints(), vec!["f1"]);
        let record = reopened.get_metadata("f1").unwrap();
        assert_eq!(record.fields["tags"], DataValue::from(vec!["x", "y"]));
    }

    #[test]
    fn test_drop_discards_unflushed_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        {
            let mut store = FileMetadataStore::open(&path).unwrap();
            store.insert_new_vector("f1", Metadata::new()).unwrap();
            store.flush().unwrap();
            store.insert_new_vector("f2", Metadata::new()).unwrap();
            store.delete("f1").unwrap();
        }
        let reopened = FileMetadataStore::open(&path).unwrap();
        assert_eq!(reopened.fingerprints(), vec!["f1"]);
    }

    #[test]
    fn test_corrupt_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            FileMetadataStore::open(&path),
            Err(VdsError::CorruptPersistedState(_))
        ));
    }

    #[test]
    fn test_failed_insert_does_not_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        let mut store = FileMetadataStore::open(&path).unwrap();
        let bad = metadata_from([("slot_id", DataValue::from("x"))]);
        assert!(store.insert_new_vector("f1", bad).is_err());
        store.flush().unwrap();
        assert!(!path.exists());
    }
}
