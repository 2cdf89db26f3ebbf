//! On-disk persistence of collections.
//!
//! Each collection is saved as two files sharing a base path:
//!
//! - `<base>.index`: the index blob (see [`crate::vector::index::flat`])
//! - `<base>.fpmap.json`: the fingerprint map, the collection shape and the
//!   CRC32 of the blob it was written with
//!
//! Both files are written to temporaries in the target directory and renamed
//! into place. The stored checksum ties the pair together: a map whose blob
//! was replaced by a different save fails to load.
//!
//! `save_all` additionally writes a `collections.json` manifest mapping
//! collection names to base file names.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{Result, VdsError};
use crate::vector::fingerprint::{FingerprintIndex, SlotEntry};
use crate::vector::index::read_index;
use crate::vector::store::collection::Collection;
use crate::vector::store::config::CollectionConfig;

pub const INDEX_SUFFIX: &str = "index";
pub const MAP_SUFFIX: &str = "fpmap.json";
pub const COLLECTION_MANIFEST_FILE: &str = "collections.json";
pub const COLLECTION_MANIFEST_VERSION: u32 = 1;
const MAP_FILE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct FingerprintMapFile {
    version: u32,
    collection: String,
    config: CollectionConfig,
    index_checksum: u32,
    entries: Vec<SlotEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub file_stem: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionManifest {
    pub version: u32,
    pub collections: Vec<ManifestEntry>,
}

/// `<base>.index` and `<base>.fpmap.json`.
pub fn artifact_paths(base: &Path) -> (PathBuf, PathBuf) {
    (with_suffix(base, INDEX_SUFFIX), with_suffix(base, MAP_SUFFIX))
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// File stem for a collection name: anything outside `[A-Za-z0-9_-]` becomes `_`.
pub fn sanitize_file_stem(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|ch| match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => ch,
            _ => '_',
        })
        .collect();
    if sanitized.is_empty() {
        sanitized.push_str("collection");
    }
    sanitized
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn stage(path: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let dir = parent_dir(path);
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

fn persist(tmp: NamedTempFile, path: &Path) -> Result<()> {
    tmp.persist(path).map_err(|e| VdsError::Io(e.error))?;
    Ok(())
}

/// Write a single file atomically.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = stage(path, bytes)?;
    persist(tmp, path)
}

/// Write a collection's index blob and fingerprint map as a pair.
pub fn write_collection(collection: &Collection, base: &Path) -> Result<()> {
    let (index_path, map_path) = artifact_paths(base);

    let mut blob = Vec::new();
    collection.index().write_to(&mut blob)?;

    let map = FingerprintMapFile {
        version: MAP_FILE_VERSION,
        collection: collection.name().to_string(),
        config: *collection.config(),
        index_checksum: crc32fast::hash(&blob),
        entries: collection.fingerprints().to_entries(),
    };
    let map_bytes = serde_json::to_vec_pretty(&map)?;

    // Stage both before renaming either.
    let index_tmp = stage(&index_path, &blob)?;
    let map_tmp = stage(&map_path, &map_bytes)?;
    persist(index_tmp, &index_path)?;
    persist(map_tmp, &map_path)
}

/// Read a collection saved by [`write_collection`].
pub fn read_collection(name: &str, base: &Path) -> Result<Collection> {
    let (index_path, map_path) = artifact_paths(base);
    for path in [&index_path, &map_path] {
        if !path.exists() {
            return Err(VdsError::corrupt(format!(
                "missing persisted artifact {}",
                path.display()
            )));
        }
    }

    let blob = fs::read(&index_path)?;
    let map_bytes = fs::read(&map_path)?;
    let map: FingerprintMapFile = serde_json::from_slice(&map_bytes).map_err(|e| {
        VdsError::corrupt(format!("unreadable fingerprint map {}: {e}", map_path.display()))
    })?;

    if map.version != MAP_FILE_VERSION {
        return Err(VdsError::corrupt(format!(
            "fingerprint map version mismatch: expected {MAP_FILE_VERSION}, found {}",
            map.version
        )));
    }
    if crc32fast::hash(&blob) != map.index_checksum {
        return Err(VdsError::corrupt(format!(
            "{} was not written together with {}",
            index_path.display(),
            map_path.display()
        )));
    }

    let index = read_index(&mut blob.as_slice())?;
    if index.dimension() != map.config.dimension
        || index.metric() != map.config.metric
        || index.kind() != map.config.kind
    {
        return Err(VdsError::corrupt(format!(
            "collection '{name}': index header disagrees with fingerprint map"
        )));
    }

    let fingerprints = FingerprintIndex::from_entries(map.entries)?;
    if map.collection != name {
        log::debug!(
            "loading collection '{}' from artifacts saved as '{}'",
            name,
            map.collection
        );
    }
    Collection::from_parts(name, index, fingerprints)
}

pub fn write_manifest(dir: &Path, entries: Vec<ManifestEntry>) -> Result<()> {
    let manifest = CollectionManifest {
        version: COLLECTION_MANIFEST_VERSION,
        collections: entries,
    };
    let bytes = serde_json::to_vec_pretty(&manifest)?;
    write_atomic(&dir.join(COLLECTION_MANIFEST_FILE), &bytes)
}

/// Entries of `collections.json`, or an empty list if the directory has none.
pub fn read_manifest(dir: &Path) -> Result<Vec<ManifestEntry>> {
    let path = dir.join(COLLECTION_MANIFEST_FILE);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let bytes = fs::read(&path)?;
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    let manifest: CollectionManifest = serde_json::from_slice(&bytes)
        .map_err(|e| VdsError::corrupt(format!("unreadable collection manifest: {e}")))?;
    if manifest.version != COLLECTION_MANIFEST_VERSION {
        return Err(VdsError::corrupt(format!(
            "collection manifest version mismatch: expected {}, found {}",
            COLLECTION_MANIFEST_VERSION, manifest.version
        )));
    }
    Ok(manifest.collections)
}
