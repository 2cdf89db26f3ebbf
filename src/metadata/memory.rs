//! In-memory metadata table.

use ahash::AHashMap;
use chrono::Utc;

use crate::data::Metadata;
use crate::error::{Result, VdsError};
use crate::metadata::MetadataStore;
use crate::metadata::record::MetadataRecord;

/// Metadata records held in a hash map; nothing survives the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryMetadataStore {
    records: AHashMap<String, MetadataRecord>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_records(records: impl IntoIterator<Item = MetadataRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (r.fingerprint.clone(), r))
                .collect(),
        }
    }

    /// Records sorted by fingerprint.
    pub(crate) fn records_sorted(&self) -> Vec<&MetadataRecord> {
        let mut records: Vec<&MetadataRecord> = self.records.values().collect();
        records.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
        records
    }

    fn record_mut(&mut self, fingerprint: &str) -> Result<&mut MetadataRecord> {
        self.records
            .get_mut(fingerprint)
            .ok_or_else(|| VdsError::not_found(format!("metadata for '{fingerprint}'")))
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn insert_new_vector(&mut self, fingerprint: &str, data: Metadata) -> Result<bool> {
        if fingerprint.is_empty() {
            return Err(VdsError::invalid_argument("fingerprint must not be empty"));
        }
        if self.records.contains_key(fingerprint) {
            return Err(VdsError::duplicate(fingerprint));
        }
        let record = MetadataRecord::from_data(fingerprint, data, Utc::now())?;
        self.records.insert(fingerprint.to_string(), record);
        Ok(true)
    }

    fn bulk_update_fields(&mut self, fingerprint: &str, updates: Metadata) -> Result<bool> {
        let record = self.record_mut(fingerprint)?;
        if updates.is_empty() {
            return Ok(false);
        }
        record.apply_updates(updates, Utc::now())?;
        Ok(true)
    }

    fn get_metadata(&self, fingerprint: &str) -> Result<MetadataRecord> {
        self.records
            .get(fingerprint)
            .cloned()
            .ok_or_else(|| VdsError::not_found(format!("metadata for '{fingerprint}'")))
    }

    fn delete(&mut self, fingerprint: &str) -> Result<bool> {
        Ok(self.records.remove(fingerprint).is_some())
    }

    fn touch(&mut self, fingerprint: &str) -> Result<()> {
        self.record_mut(fingerprint)?.last_accessed_at = Some(Utc::now());
        Ok(())
    }

    fn contains(&self, fingerprint: &str) -> bool {
        self.records.contains_key(fingerprint)
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn fingerprints(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.records.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataValue, metadata_from};
    use crate::metadata::record::RecordStatus;

    #[test]
    fn test_insert_and_get() {
        let mut store = MemoryMetadataStore::new();
        let data = metadata_from([("collection", DataValue::from("docs")), ("title", "A".into())]);
        assert!(store.insert_new_vector("f1", data).unwrap());

        let record = store.get_metadata("f1").unwrap();
        assert_eq!(record.collection.as_deref(), Some("docs"));
        assert_eq!(record.fields["title"], DataValue::from("A"));
        assert_eq!(record.created_at, record.updated_at);
        assert!(store.contains("f1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_insert_duplicate() {
        let mut store = MemoryMetadataStore::new();
        store.insert_new_vector("f1", Metadata::new()).unwrap();
        assert!(matches!(
            store.insert_new_vector("f1", Metadata::new()),
            Err(VdsError::DuplicateFingerprint { .. })
        ));
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let mut store = MemoryMetadataStore::new();
        let updates = metadata_from([("k", DataValue::from(1))]);
        assert!(matches!(
            store.bulk_update_fields("nope", updates),
            Err(VdsError::NotFound(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_refreshes_updated_at() {
        let mut store = MemoryMetadataStore::new();
        store.insert_new_vector("f1", Metadata::new()).unwrap();
        let before = store.get_metadata("f1").unwrap();

        let updates = metadata_from([("status", DataValue::from("soft_deleted"))]);
        assert!(store.bulk_update_fields("f1", updates).unwrap());
        let after = store.get_metadata("f1").unwrap();
        assert_eq!(after.status, RecordStatus::SoftDeleted);
        assert!(after.updated_at >= before.updated_at);
        assert_eq!(after.created_at, before.created_at);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let mut store = MemoryMetadataStore::new();
        store.insert_new_vector("f1", Metadata::new()).unwrap();
        assert!(store.delete("f1").unwrap());
        assert!(!store.delete("f1").unwrap());
        assert!(store.get_metadata("f1").unwrap_err().is_not_found());
    }

    #[test]
    fn test_touch() {
        let mut store = MemoryMetadataStore::new();
        store.insert_new_vector("f1", Metadata::new()).unwrap();
        store.touch("f1").unwrap();
        assert!(store.get_metadata("f1").unwrap().last_accessed_at.is_some());
        assert!(store.touch("f2").is_err());
    }

    #[test]
    fn test_fingerprints_sorted() {
        let mut store = MemoryMetadataStore::new();
        for fp in ["c", "a", "b"] {
            store.insert_new_vector(fp, Metadata::new()).unwrap();
        }
        assert_eq!(store.fingerprints(), vec!["a", "b", "c"]);
    }
}
