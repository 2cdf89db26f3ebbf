//! VectorStore: per-collection vector storage and retrieval.
//!
//! This module owns the physical indexes and the fingerprint ↔ slot mapping of
//! every collection. It does NOT handle metadata; pairing vectors with their
//! metadata records is the job of
//! [`VectorIndexManager`](crate::manager::VectorIndexManager).
//!
//! # Module Structure
//!
//! - [`collection`] - A single collection (index + fingerprint map)
//! - [`config`] - Configuration types (VectorStoreConfig, CollectionConfig)
//! - [`response`] - Search hits, purge outcomes and statistics
//! - [`snapshot`] - Paired on-disk persistence

pub mod collection;
pub mod config;
pub mod response;
pub mod snapshot;
#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{Result, VdsError};

use self::collection::Collection;
use self::config::{CollectionConfig, VectorStoreConfig};
use self::response::{CollectionStats, PurgeOutcome, SearchHit};
use self::snapshot::ManifestEntry;

/// Result of a successful insert, used by the manager for rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Insertion {
    pub slot: u64,
    pub created_collection: bool,
}

/// A vector storage component.
pub struct VectorStore {
    config: VectorStoreConfig,
    collections: HashMap<String, Collection>,
}

impl fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorStore")
            .field("config", &self.config)
            .field("collection_count", &self.collections.len())
            .finish()
    }
}

impl Default for VectorStore {
    fn default() -> Self {
        Self {
            config: VectorStoreConfig::default(),
            collections: HashMap::new(),
        }
    }
}

impl VectorStore {
    /// Create a new, empty vector store with the given configuration.
    pub fn new(config: VectorStoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            collections: HashMap::new(),
        })
    }

    pub fn config(&self) -> &VectorStoreConfig {
        &self.config
    }

    // =========================================================================
    // Internal methods
    // =========================================================================

    fn collection(&self, name: &str) -> Result<&Collection> {
        self.collections
            .get(name)
            .ok_or_else(|| VdsError::collection_not_found(name))
    }

    fn collection_mut(&mut self, name: &str) -> Result<&mut Collection> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| VdsError::collection_not_found(name))
    }

    fn check_name(kind: &str, value: &str) -> Result<()> {
        if value.is_empty() {
            return Err(VdsError::invalid_argument(format!("{kind} must not be empty")));
        }
        Ok(())
    }

    /// Insert and report whether the collection was created by this call.
    pub(crate) fn insert(
        &mut self,
        collection: &str,
        fingerprint: &str,
        vector: &[f32],
    ) -> Result<Insertion> {
        Self::check_name("collection name", collection)?;
        Self::check_name("fingerprint", fingerprint)?;

        let created_collection = !self.collections.contains_key(collection);
        if created_collection {
            let config = self.config.collection_config(collection);
            // Validate against the shape the collection would get, so that a
            // rejected first vector does not leave an empty collection behind.
            let candidate = Collection::new(collection, config)?;
            candidate.validate_vector(vector)?;
            log::info!(
                "creating collection '{}' (dimension={}, metric={}, kind={})",
                collection,
                config.dimension,
                config.metric,
                config.kind
            );
            self.collections.insert(collection.to_string(), candidate);
        }

        let result = self.collection_mut(collection)?.add(fingerprint, vector);
        match result {
            Ok(slot) => {
                log::debug!("added '{fingerprint}' to '{collection}' at slot {slot}");
                Ok(Insertion {
                    slot,
                    created_collection,
                })
            }
            Err(e) => {
                if created_collection {
                    self.collections.remove(collection);
                }
                Err(e)
            }
        }
    }

    /// Undo an [`insert`](Self::insert).
    pub(crate) fn rollback_insert(
        &mut self,
        collection: &str,
        fingerprint: &str,
        insertion: Insertion,
    ) -> Result<()> {
        self.collection_mut(collection)?.rollback_add(fingerprint)?;
        if insertion.created_collection && self.collection(collection)?.count(true) == 0 {
            self.collections.remove(collection);
        }
        log::warn!("rolled back insert of '{fingerprint}' into '{collection}'");
        Ok(())
    }

    // =========================================================================
    // Public API
    // =========================================================================

    /// Create a collection explicitly.
    ///
    /// Returns `false` if a collection with the same shape already exists.
    pub fn create_collection(&mut self, name: &str, config: CollectionConfig) -> Result<bool> {
        Self::check_name("collection name", name)?;
        if let Some(existing) = self.collections.get(name) {
            if existing.config() == &config {
                return Ok(false);
            }
            return Err(VdsError::invalid_config(format!(
                "collection '{name}' already exists with a different shape"
            )));
        }
        let collection = Collection::new(name, config)?;
        log::info!(
            "creating collection '{}' (dimension={}, metric={}, kind={})",
            name,
            config.dimension,
            config.metric,
            config.kind
        );
        self.collections.insert(name.to_string(), collection);
        Ok(true)
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    /// Collection names, sorted.
    pub fn list_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove a collection and everything in it from memory.
    pub fn drop_collection(&mut self, name: &str) -> Result<()> {
        self.collections
            .remove(name)
            .map(|_| log::info!("dropped collection '{name}'"))
            .ok_or_else(|| VdsError::collection_not_found(name))
    }

    pub fn collection_config(&self, name: &str) -> Result<CollectionConfig> {
        Ok(*self.collection(name)?.config())
    }

    /// Add a vector, creating the collection on first use.
    pub fn add_vector(&mut self, collection: &str, fingerprint: &str, vector: &[f32]) -> Result<bool> {
        self.insert(collection, fingerprint, vector).map(|_| true)
    }

    /// Nearest live vectors to `query`, best first, at most `top_k`.
    pub fn search_vectors(
        &self,
        collection: &str,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        self.collection(collection)?.search(query, top_k)
    }

    /// All live vectors ranked against `query`.
    pub fn rank_all(&self, collection: &str, query: &[f32]) -> Result<Vec<SearchHit>> {
        self.collection(collection)?.search_all(query)
    }

    /// Reconstruct the stored embedding of a live fingerprint.
    pub fn get_vector_by_fingerprint(&self, collection: &str, fingerprint: &str) -> Result<Vec<f32>> {
        self.collection(collection)?.get(fingerprint)
    }

    /// Current slot of a live fingerprint.
    pub fn slot_of(&self, collection: &str, fingerprint: &str) -> Result<u64> {
        self.collection(collection)?.slot_of(fingerprint)
    }

    /// `Some(true)` if soft-deleted, `Some(false)` if live, `None` if unknown.
    pub fn is_deleted(&self, collection: &str, fingerprint: &str) -> Result<Option<bool>> {
        Ok(self.collection(collection)?.lookup(fingerprint))
    }

    /// Soft-delete a fingerprint; with `hard` the collection is purged as well.
    ///
    /// Returns `true` if the fingerprint was live before the call.
    pub fn remove_vector(&mut self, collection: &str, fingerprint: &str, hard: bool) -> Result<bool> {
        let changed = self.collection_mut(collection)?.remove(fingerprint)?;
        if changed {
            log::debug!("soft-deleted '{fingerprint}' in '{collection}'");
        }
        if hard {
            self.purge_deleted(collection)?;
        }
        Ok(changed)
    }

    /// Rebuild a collection without its soft-deleted slots.
    pub fn purge_deleted(&mut self, collection: &str) -> Result<PurgeOutcome> {
        let outcome = self.collection_mut(collection)?.purge()?;
        if outcome.reclaimed() > 0 {
            log::info!(
                "purged collection '{}': {} slots reclaimed, {} remaining",
                collection,
                outcome.reclaimed(),
                outcome.remaining
            );
        }
        Ok(outcome)
    }

    pub fn count_vectors(&self, collection: &str, include_deleted: bool) -> Result<usize> {
        Ok(self.collection(collection)?.count(include_deleted))
    }

    /// Fingerprints in slot order.
    pub fn list_fingerprints(&self, collection: &str, include_deleted: bool) -> Result<Vec<String>> {
        Ok(self.collection(collection)?.list(include_deleted))
    }

    pub fn collection_stats(&self, collection: &str) -> Result<CollectionStats> {
        Ok(self.collection(collection)?.stats())
    }

    /// Write one collection to `<base>.index` + `<base>.fpmap.json`.
    pub fn save(&self, collection: &str, base: &Path) -> Result<()> {
        let coll = self.collection(collection)?;
        snapshot::write_collection(coll, base)?;
        log::info!(
            "saved collection '{}' ({} slots) to {}",
            collection,
            coll.count(true),
            base.display()
        );
        Ok(())
    }

    /// Load one collection from a saved pair, replacing any in-memory state.
    pub fn load(&mut self, collection: &str, base: &Path) -> Result<()> {
        Self::check_name("collection name", collection)?;
        let loaded = snapshot::read_collection(collection, base)?;
        log::info!(
            "loaded collection '{}' ({} slots) from {}",
            collection,
            loaded.count(true),
            base.display()
        );
        self.collections.insert(collection.to_string(), loaded);
        Ok(())
    }

    /// Save every collection into `dir` along with a manifest.
    pub fn save_all(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let mut entries = Vec::with_capacity(self.collections.len());
        let mut issued: HashSet<String> = HashSet::with_capacity(self.collections.len());

        for name in self.list_collections() {
            let base = snapshot::sanitize_file_stem(&name);
            let mut stem = base.clone();
            let mut suffix = 1;
            while issued.contains(&stem) {
                stem = format!("{base}-{suffix}");
                suffix += 1;
            }
            issued.insert(stem.clone());

            self.save(&name, &dir.join(&stem))?;
            entries.push(ManifestEntry {
                name,
                file_stem: stem,
            });
        }
        snapshot::write_manifest(dir, entries)
    }

    /// Load every collection listed in `dir`'s manifest.
    ///
    /// Nothing is installed unless every collection loads.
    pub fn load_all(&mut self, dir: &Path) -> Result<usize> {
        let entries = snapshot::read_manifest(dir)?;
        let mut loaded = Vec::with_capacity(entries.len());
        for entry in entries {
            let collection = snapshot::read_collection(&entry.name, &dir.join(&entry.file_stem))?;
            loaded.push((entry.name, collection));
        }

        let count = loaded.len();
        for (name, collection) in loaded {
            self.collections.insert(name, collection);
        }
        log::info!("loaded {} collections from {}", count, dir.display());
        Ok(count)
    }

    /// Save everything to the configured storage directory.
    pub fn commit(&self) -> Result<()> {
        let dir = self.config.storage_dir.as_ref().ok_or_else(|| {
            VdsError::invalid_config("no storage_dir configured for the vector store")
        })?;
        self.save_all(dir)
    }
}
