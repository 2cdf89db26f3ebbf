//! VectorIndexManager: the single entry point pairing vectors with metadata.
//!
//! The manager owns a [`VectorStore`] and a [`MetadataStore`] and is the only
//! component that knows they are related. Every operation that touches a
//! vector also touches its metadata record:
//!
//! | Operation | Vector side | Metadata side |
//! |---|---|---|
//! | `add_vector` | append, assign slot | insert record (rolled back on failure) |
//! | `remove_vector` | soft-delete flag | `status = soft_deleted` |
//! | `purge_deleted` | rebuild index, renumber slots | delete purged, rewrite `slot_id` |
//!
//! Both stores are written to disk together by [`VectorIndexManager::save_all`]
//! and nowhere else, so the metadata file always describes the last saved
//! vector snapshot. [`VectorIndexManager::open`] refuses a pair that disagrees.
//!
//! All methods take `&mut self` or `&self`; the manager does no locking of
//! its own. Use [`VectorIndexManager::into_shared`] to share one across
//! threads.

use std::path::Path;
use std::sync::Arc;

use ahash::AHashSet;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::{DeletionConfig, ManagerConfig};
use crate::data::{DataValue, Metadata};
use crate::error::{Result, VdsError};
use crate::metadata::record::{FIELD_COLLECTION, FIELD_SLOT_ID, FIELD_STATUS};
use crate::metadata::{MetadataRecord, MetadataStore, MetadataStoreFactory, RecordStatus};
use crate::vector::VectorStore;
use crate::vector::store::config::CollectionConfig;
use crate::vector::store::response::{CollectionStats, PurgeOutcome, SearchHit};
use crate::vector::store::snapshot::{COLLECTION_MANIFEST_FILE, sanitize_file_stem};

/// Metadata keys written only by the manager.
const MANAGED_FIELDS: [&str; 3] = [FIELD_COLLECTION, FIELD_SLOT_ID, FIELD_STATUS];

/// A manager shared across threads. The mutex is the critical section for
/// every operation.
pub type SharedIndexManager = Arc<Mutex<VectorIndexManager>>;

/// One search result, optionally joined with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub fingerprint: String,
    pub distance: f32,
    pub metadata: Option<MetadataRecord>,
}

/// Cross-store consistency report produced by
/// [`VectorIndexManager::health_check`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub collections: usize,
    pub live_vectors: usize,
    pub deleted_vectors: usize,
    pub metadata_records: usize,
    /// Vectors with no metadata record.
    pub missing_metadata: Vec<String>,
    /// Metadata records with no vector.
    pub orphaned_metadata: Vec<String>,
    /// Records whose collection, slot id or status disagree with the vector side.
    pub mismatched_metadata: Vec<String>,
    /// Collections whose deletion ratio exceeds the compaction threshold.
    pub needs_compaction: Vec<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.missing_metadata.is_empty()
            && self.orphaned_metadata.is_empty()
            && self.mismatched_metadata.is_empty()
    }
}

#[derive(Debug)]
pub struct VectorIndexManager {
    vectors: VectorStore,
    metadata: Box<dyn MetadataStore>,
    deletion: DeletionConfig,
    track_access: bool,
}

impl VectorIndexManager {
    pub fn new(vectors: VectorStore, metadata: Box<dyn MetadataStore>, deletion: DeletionConfig) -> Self {
        Self {
            vectors,
            metadata,
            deletion,
            track_access: false,
        }
    }

    /// Build a manager from configuration.
    ///
    /// If the vector store has a `storage_dir` containing a saved manifest,
    /// the collections in it are loaded. The loaded vectors and the metadata
    /// table must agree; otherwise [`VdsError::Consistency`] is returned.
    pub fn open(config: ManagerConfig) -> Result<Self> {
        config.validate()?;
        let metadata = MetadataStoreFactory::create(&config.metadata)?;
        let storage_dir = config.vector.storage_dir.clone();
        let vectors = VectorStore::new(config.vector)?;
        let mut manager =
            Self::new(vectors, metadata, config.deletion).with_track_access(config.track_access);

        if let Some(dir) = storage_dir {
            if dir.join(COLLECTION_MANIFEST_FILE).exists() {
                manager.load_all(&dir)?;
            }
        }

        let report = manager.health_check()?;
        if !report.is_healthy() {
            return Err(VdsError::consistency(format!(
                "stored vectors and metadata disagree: {} vectors without metadata, {} orphaned records, {} mismatched records",
                report.missing_metadata.len(),
                report.orphaned_metadata.len(),
                report.mismatched_metadata.len()
            )));
        }
        Ok(manager)
    }

    pub fn with_track_access(mut self, track_access: bool) -> Self {
        self.track_access = track_access;
        self
    }

    pub fn into_shared(self) -> SharedIndexManager {
        Arc::new(Mutex::new(self))
    }

    pub fn vector_store(&self) -> &VectorStore {
        &self.vectors
    }

    pub fn metadata_store(&self) -> &dyn MetadataStore {
        self.metadata.as_ref()
    }

    pub fn deletion_config(&self) -> &DeletionConfig {
        &self.deletion
    }

    // =========================================================================
    // Internal methods
    // =========================================================================

    fn reject_managed_fields(metadata: &Metadata) -> Result<()> {
        if let Some(key) = MANAGED_FIELDS.iter().find(|k| metadata.contains_key(**k)) {
            return Err(VdsError::invalid_argument(format!(
                "metadata field '{key}' is maintained by the index manager"
            )));
        }
        Ok(())
    }

    /// Metadata for a fingerprint the vector side returned.
    fn joined_record(&self, fingerprint: &str) -> Result<MetadataRecord> {
        self.metadata.get_metadata(fingerprint).map_err(|e| {
            if e.is_not_found() {
                VdsError::consistency(format!("vector '{fingerprint}' has no metadata record"))
            } else {
                e
            }
        })
    }

    fn set_managed(&mut self, fingerprint: &str, key: &str, value: DataValue) -> Result<()> {
        let updates = Metadata::from([(key.to_string(), value)]);
        self.metadata.bulk_update_fields(fingerprint, updates).map_err(|e| {
            if e.is_not_found() {
                VdsError::consistency(format!("vector '{fingerprint}' has no metadata record"))
            } else {
                e
            }
        })?;
        Ok(())
    }

    // =========================================================================
    // Public API
    // =========================================================================

    /// Create a collection with an explicit shape.
    pub fn create_collection(&mut self, name: &str, config: CollectionConfig) -> Result<bool> {
        self.vectors.create_collection(name, config)
    }

    /// Add a vector and its metadata as one step.
    ///
    /// If the metadata insert fails the vector insert is undone and
    /// [`VdsError::MetadataWrite`] is returned. A fingerprint that is known
    /// anywhere in the manager, including soft-deleted and not yet purged,
    /// is a [`VdsError::DuplicateFingerprint`].
    pub fn add_vector(
        &mut self,
        collection: &str,
        fingerprint: &str,
        vector: &[f32],
        metadata: Metadata,
    ) -> Result<bool> {
        Self::reject_managed_fields(&metadata)?;
        if self.metadata.contains(fingerprint) {
            return Err(VdsError::duplicate(fingerprint));
        }

        let insertion = self.vectors.insert(collection, fingerprint, vector)?;

        let written = DataValue::try_from(insertion.slot).and_then(|slot| {
            let mut data = metadata;
            data.insert(FIELD_COLLECTION.to_string(), DataValue::from(collection));
            data.insert(FIELD_SLOT_ID.to_string(), slot);
            self.metadata.insert_new_vector(fingerprint, data)
        });

        if let Err(source) = written {
            log::warn!("metadata insert for '{fingerprint}' failed: {source}");
            if let Err(rollback) = self.vectors.rollback_insert(collection, fingerprint, insertion) {
                log::error!("rollback of '{fingerprint}' in '{collection}' failed: {rollback}");
                return Err(VdsError::consistency(format!(
                    "metadata write for '{fingerprint}' failed ({source}) and the vector could not be rolled back ({rollback})"
                )));
            }
            return Err(VdsError::MetadataWrite {
                fingerprint: fingerprint.to_string(),
                source: Box::new(source),
            });
        }

        log::debug!(
            "added '{}' to '{}' at slot {}",
            fingerprint,
            collection,
            insertion.slot
        );
        Ok(true)
    }

    /// Nearest live vectors, best first, optionally joined with metadata.
    pub fn search_vectors(
        &self,
        collection: &str,
        query: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<SearchResult>> {
        let hits = self.vectors.search_vectors(collection, query, top_k)?;
        hits.into_iter()
            .map(|SearchHit { fingerprint, distance }| {
                let metadata = if include_metadata {
                    Some(self.joined_record(&fingerprint)?)
                } else {
                    None
                };
                Ok(SearchResult {
                    fingerprint,
                    distance,
                    metadata,
                })
            })
            .collect()
    }

    /// Like [`search_vectors`](Self::search_vectors), keeping only hits whose
    /// metadata passes `filter`. Up to `top_k` passing hits are returned.
    pub fn search_filtered<F>(
        &self,
        collection: &str,
        query: &[f32],
        top_k: usize,
        filter: F,
    ) -> Result<Vec<SearchResult>>
    where
        F: Fn(&MetadataRecord) -> bool,
    {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let mut results = Vec::with_capacity(top_k);
        for hit in self.vectors.rank_all(collection, query)? {
            let record = self.joined_record(&hit.fingerprint)?;
            if filter(&record) {
                results.push(SearchResult {
                    fingerprint: hit.fingerprint,
                    distance: hit.distance,
                    metadata: Some(record),
                });
                if results.len() == top_k {
                    break;
                }
            }
        }
        Ok(results)
    }

    /// Stored embedding of a live fingerprint.
    pub fn get_vector(&mut self, collection: &str, fingerprint: &str) -> Result<Vec<f32>> {
        let vector = self.vectors.get_vector_by_fingerprint(collection, fingerprint)?;
        if self.track_access {
            self.metadata.touch(fingerprint)?;
        }
        Ok(vector)
    }

    pub fn get_vector_metadata(&self, fingerprint: &str) -> Result<MetadataRecord> {
        self.metadata.get_metadata(fingerprint)
    }

    /// Merge caller fields into a record. Vector data is not touched.
    pub fn update_vector_metadata(&mut self, fingerprint: &str, updates: Metadata) -> Result<bool> {
        Self::reject_managed_fields(&updates)?;
        self.metadata.bulk_update_fields(fingerprint, updates)
    }

    /// Soft-delete a vector and mark its metadata `soft_deleted`.
    ///
    /// Returns `true` if the vector was live. Removing an already removed
    /// fingerprint is a no-op.
    pub fn remove_vector(&mut self, collection: &str, fingerprint: &str) -> Result<bool> {
        if self.vectors.is_deleted(collection, fingerprint)?.is_none() {
            return Err(VdsError::not_found(format!(
                "fingerprint '{fingerprint}' in collection '{collection}'"
            )));
        }
        let record = self.joined_record(fingerprint)?;

        let changed = self.vectors.remove_vector(collection, fingerprint, false)?;
        if record.status != RecordStatus::SoftDeleted {
            self.set_managed(
                fingerprint,
                FIELD_STATUS,
                DataValue::from(RecordStatus::SoftDeleted.to_string()),
            )?;
        }
        if changed {
            log::debug!("removed '{fingerprint}' from '{collection}'");
        }

        if changed && self.deletion.auto_purge {
            self.purge_if_needed(collection)?;
        }
        Ok(changed)
    }

    /// Physically drop soft-deleted vectors and their metadata.
    pub fn purge_deleted(&mut self, collection: &str) -> Result<PurgeOutcome> {
        let outcome = self.vectors.purge_deleted(collection)?;

        for fingerprint in &outcome.purged {
            self.metadata.delete(fingerprint)?;
        }
        for moved in &outcome.moved {
            self.set_managed(&moved.fingerprint, FIELD_SLOT_ID, DataValue::try_from(moved.new_slot)?)?;
        }

        if !outcome.purged.is_empty() {
            log::info!(
                "purged {} records from '{}', {} survivors renumbered",
                outcome.purged.len(),
                collection,
                outcome.moved.len()
            );
        }
        Ok(outcome)
    }

    /// Purge only if the deletion ratio exceeds the compaction threshold.
    pub fn purge_if_needed(&mut self, collection: &str) -> Result<Option<PurgeOutcome>> {
        let stats = self.vectors.collection_stats(collection)?;
        if !stats.needs_compaction(self.deletion.compaction_threshold) {
            return Ok(None);
        }
        log::info!(
            "collection '{}' deletion ratio {:.2} exceeds {:.2}, purging",
            collection,
            stats.deletion_ratio,
            self.deletion.compaction_threshold
        );
        self.purge_deleted(collection).map(Some)
    }

    /// Drop a collection along with every metadata record that belongs to it.
    pub fn drop_collection(&mut self, collection: &str) -> Result<()> {
        let fingerprints = self.vectors.list_fingerprints(collection, true)?;
        self.vectors.drop_collection(collection)?;
        for fingerprint in &fingerprints {
            self.metadata.delete(fingerprint)?;
        }
        Ok(())
    }

    pub fn count_vectors(&self, collection: &str, include_deleted: bool) -> Result<usize> {
        self.vectors.count_vectors(collection, include_deleted)
    }

    pub fn list_fingerprints(&self, collection: &str, include_deleted: bool) -> Result<Vec<String>> {
        self.vectors.list_fingerprints(collection, include_deleted)
    }

    pub fn list_collections(&self) -> Vec<String> {
        self.vectors.list_collections()
    }

    pub fn collection_stats(&self, collection: &str) -> Result<CollectionStats> {
        self.vectors.collection_stats(collection)
    }

    /// Compare both stores record by record.
    pub fn health_check(&self) -> Result<HealthReport> {
        let mut report = HealthReport {
            metadata_records: self.metadata.len(),
            ..HealthReport::default()
        };
        let mut known = AHashSet::new();

        for collection in self.vectors.list_collections() {
            report.collections += 1;
            let stats = self.vectors.collection_stats(&collection)?;
            report.live_vectors += stats.live;
            report.deleted_vectors += stats.deleted;
            if stats.needs_compaction(self.deletion.compaction_threshold) {
                report.needs_compaction.push(collection.clone());
            }

            for fingerprint in self.vectors.list_fingerprints(&collection, true)? {
                let deleted = self.vectors.is_deleted(&collection, &fingerprint)?.unwrap_or(true);
                let record = match self.metadata.get_metadata(&fingerprint) {
                    Ok(record) => record,
                    Err(e) if e.is_not_found() => {
                        report.missing_metadata.push(fingerprint.clone());
                        known.insert(fingerprint);
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                let slot_ok = deleted
                    || record.slot_id == Some(self.vectors.slot_of(&collection, &fingerprint)?);
                let status_ok = record.is_active() != deleted;
                if record.collection.as_deref() != Some(collection.as_str()) || !slot_ok || !status_ok {
                    report.mismatched_metadata.push(fingerprint.clone());
                }
                known.insert(fingerprint);
            }
        }

        report.orphaned_metadata = self
            .metadata
            .fingerprints()
            .into_iter()
            .filter(|fp| !known.contains(fp))
            .collect();

        if report.is_healthy() {
            log::debug!(
                "health check passed: {} collections, {} live vectors",
                report.collections,
                report.live_vectors
            );
        } else {
            log::warn!(
                "health check found {} vectors without metadata, {} orphaned records, {} mismatched records",
                report.missing_metadata.len(),
                report.orphaned_metadata.len(),
                report.mismatched_metadata.len()
            );
        }
        Ok(report)
    }

    /// Export one collection's vectors to `<dir>/<sanitized name>`.
    ///
    /// The metadata table is not written; only [`save_all`](Self::save_all)
    /// commits it.
    pub fn save_collection(&self, collection: &str, dir: &Path) -> Result<()> {
        self.vectors.save(collection, &dir.join(sanitize_file_stem(collection)))
    }

    /// Commit every collection to the configured storage directory, then the
    /// metadata table.
    pub fn save_all(&mut self) -> Result<()> {
        self.vectors.commit()?;
        self.metadata.flush()
    }

    /// Export every collection's vectors to `dir`. The metadata table is not
    /// written.
    pub fn save_all_to(&self, dir: &Path) -> Result<()> {
        self.vectors.save_all(dir)
    }

    /// Load every collection saved in `dir`.
    pub fn load_all(&mut self, dir: &Path) -> Result<usize> {
        self.vectors.load_all(dir)
    }
}
