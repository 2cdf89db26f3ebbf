use std::fs;

use tempfile::Builder;

use crate::error::VdsError;
use crate::vector::DistanceMetric;
use crate::vector::store::VectorStore;
use crate::vector::store::snapshot::artifact_paths;
use crate::vector::{CollectionConfig, VectorStoreConfig};

fn docs_store() -> VectorStore {
    let config = VectorStoreConfig::builder()
        .collection("docs", CollectionConfig::new(4, DistanceMetric::Euclidean))
        .build();
    VectorStore::new(config).unwrap()
}

fn unit(i: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; 4];
    v[i % 4] = 1.0 + (i / 4) as f32;
    v
}

#[test]
fn test_lazy_collection_creation() {
    let mut store = docs_store();
    assert!(!store.has_collection("docs"));
    assert!(store.add_vector("docs", "a", &unit(0)).unwrap());
    assert!(store.has_collection("docs"));
    assert_eq!(store.collection_config("docs").unwrap().dimension, 4);
}

#[test]
fn test_dimension_guard_leaves_state_unchanged() {
    let mut store = docs_store();
    store.add_vector("docs", "a", &unit(0)).unwrap();

    let err = store.add_vector("docs", "b", &[1.0, 2.0]).unwrap_err();
    assert!(matches!(
        err,
        VdsError::DimensionMismatch { expected: 4, actual: 2, .. }
    ));
    assert_eq!(store.count_vectors("docs", true).unwrap(), 1);
    assert_eq!(store.list_fingerprints("docs", true).unwrap(), vec!["a"]);
    assert!(store.slot_of("docs", "b").is_err());
}

#[test]
fn test_rejected_first_vector_does_not_create_collection() {
    let mut store = docs_store();
    assert!(store.add_vector("docs", "a", &[1.0]).is_err());
    assert!(!store.has_collection("docs"));
}

#[test]
fn test_duplicate_fingerprint() {
    let mut store = docs_store();
    store.add_vector("docs", "a", &unit(0)).unwrap();
    let err = store.add_vector("docs", "a", &unit(1)).unwrap_err();
    assert!(matches!(err, VdsError::DuplicateFingerprint { .. }));
    assert_eq!(store.count_vectors("docs", true).unwrap(), 1);
}

#[test]
fn test_unknown_collection() {
    let store = docs_store();
    assert!(matches!(
        store.search_vectors("nope", &unit(0), 1),
        Err(VdsError::CollectionNotFound(_))
    ));
    assert!(matches!(
        store.count_vectors("nope", false),
        Err(VdsError::CollectionNotFound(_))
    ));
}

#[test]
fn test_search_query_dimension_mismatch() {
    let mut store = docs_store();
    store.add_vector("docs", "a", &unit(0)).unwrap();
    assert!(matches!(
        store.search_vectors("docs", &[1.0, 0.0], 1),
        Err(VdsError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_soft_delete_exclusion() {
    let mut store = docs_store();
    store.add_vector("docs", "f1", &unit(0)).unwrap();
    store.add_vector("docs", "f2", &unit(1)).unwrap();

    assert!(store.remove_vector("docs", "f1", false).unwrap());
    let hits = store.search_vectors("docs", &unit(0), 10).unwrap();
    assert!(hits.iter().all(|h| h.fingerprint != "f1"));
    assert_eq!(store.count_vectors("docs", false).unwrap(), 1);
    assert_eq!(store.count_vectors("docs", true).unwrap(), 2);
    assert_eq!(store.list_fingerprints("docs", false).unwrap(), vec!["f2"]);
    assert_eq!(store.is_deleted("docs", "f1").unwrap(), Some(true));
    assert!(store.get_vector_by_fingerprint("docs", "f1").is_err());

    // Second removal is a no-op.
    assert!(!store.remove_vector("docs", "f1", false).unwrap());
    assert_eq!(store.count_vectors("docs", false).unwrap(), 1);
}

#[test]
fn test_remove_unknown_fingerprint() {
    let mut store = docs_store();
    store.add_vector("docs", "a", &unit(0)).unwrap();
    assert!(matches!(
        store.remove_vector("docs", "zzz", false),
        Err(VdsError::NotFound(_))
    ));
}

#[test]
fn test_purge_compaction_preserves_vectors() {
    let mut store = docs_store();
    for i in 1..=5 {
        store.add_vector("docs", &format!("f{i}"), &unit(i)).unwrap();
    }
    store.remove_vector("docs", "f2", false).unwrap();
    store.remove_vector("docs", "f4", false).unwrap();

    let outcome = store.purge_deleted("docs").unwrap();
    assert_eq!(outcome.purged, vec!["f2", "f4"]);
    assert_eq!(outcome.reclaimed(), 2);
    assert_eq!(store.count_vectors("docs", false).unwrap(), 3);
    assert_eq!(store.count_vectors("docs", true).unwrap(), 3);

    for i in [1, 3, 5] {
        let fp = format!("f{i}");
        assert_eq!(store.get_vector_by_fingerprint("docs", &fp).unwrap(), unit(i));
    }
    assert_eq!(store.slot_of("docs", "f1").unwrap(), 0);
    assert_eq!(store.slot_of("docs", "f3").unwrap(), 1);
    assert_eq!(store.slot_of("docs", "f5").unwrap(), 2);
    assert_eq!(store.is_deleted("docs", "f2").unwrap(), None);
}

#[test]
fn test_hard_remove_purges_immediately() {
    let mut store = docs_store();
    store.add_vector("docs", "a", &unit(0)).unwrap();
    store.add_vector("docs", "b", &unit(1)).unwrap();
    store.remove_vector("docs", "a", true).unwrap();
    assert_eq!(store.count_vectors("docs", true).unwrap(), 1);
    assert_eq!(store.slot_of("docs", "b").unwrap(), 0);
}

#[test]
fn test_create_collection_conflict() {
    let mut store = VectorStore::default();
    let shape = CollectionConfig::new(3, DistanceMetric::InnerProduct);
    assert!(store.create_collection("c", shape).unwrap());
    assert!(!store.create_collection("c", shape).unwrap());
    assert!(matches!(
        store.create_collection("c", CollectionConfig::new(5, DistanceMetric::InnerProduct)),
        Err(VdsError::InvalidConfig(_))
    ));
}

#[test]
fn test_empty_names_rejected() {
    let mut store = docs_store();
    assert!(matches!(
        store.add_vector("", "a", &unit(0)),
        Err(VdsError::InvalidArgument(_))
    ));
    assert!(matches!(
        store.add_vector("docs", "", &unit(0)),
        Err(VdsError::InvalidArgument(_))
    ));
}

#[test]
fn test_save_and_load_pair() {
    let dir = Builder::new().prefix("vds_store").tempdir().unwrap();
    let base = dir.path().join("docs");

    let mut store = docs_store();
    for i in 0..4 {
        store.add_vector("docs", &format!("f{i}"), &unit(i)).unwrap();
    }
    store.remove_vector("docs", "f1", false).unwrap();
    store.save("docs", &base).unwrap();

    let mut restored = VectorStore::default();
    restored.load("docs", &base).unwrap();
    assert_eq!(restored.count_vectors("docs", true).unwrap(), 4);
    assert_eq!(restored.count_vectors("docs", false).unwrap(), 3);
    assert_eq!(restored.get_vector_by_fingerprint("docs", "f2").unwrap(), unit(2));
    assert_eq!(restored.is_deleted("docs", "f1").unwrap(), Some(true));
}

#[test]
fn test_load_missing_artifact() {
    let dir = Builder::new().prefix("vds_store").tempdir().unwrap();
    let base = dir.path().join("docs");

    let mut store = docs_store();
    store.add_vector("docs", "a", &unit(0)).unwrap();
    store.save("docs", &base).unwrap();

    let (index_path, _) = artifact_paths(&base);
    fs::remove_file(index_path).unwrap();

    let mut restored = VectorStore::default();
    assert!(matches!(
        restored.load("docs", &base),
        Err(VdsError::CorruptPersistedState(_))
    ));
    assert!(!restored.has_collection("docs"));
}

#[test]
fn test_load_mismatched_pair() {
    let dir = Builder::new().prefix("vds_store").tempdir().unwrap();
    let small = dir.path().join("small");
    let large = dir.path().join("large");

    let mut store = docs_store();
    store.add_vector("docs", "a", &unit(0)).unwrap();
    store.save("docs", &small).unwrap();
    store.add_vector("docs", "b", &unit(1)).unwrap();
    store.save("docs", &large).unwrap();

    // Pair the one-vector map with the two-vector index.
    let (large_index, _) = artifact_paths(&large);
    let (small_index, _) = artifact_paths(&small);
    fs::copy(large_index, small_index).unwrap();

    let mut restored = VectorStore::default();
    assert!(matches!(
        restored.load("docs", &small),
        Err(VdsError::CorruptPersistedState(_))
    ));
}

#[test]
fn test_save_all_and_load_all() {
    let dir = Builder::new().prefix("vds_store").tempdir().unwrap();

    let mut store = VectorStore::new(VectorStoreConfig::builder().default_dimension(2).build()).unwrap();
    store.add_vector("team/alpha", "a", &[1.0, 0.0]).unwrap();
    store.add_vector("team alpha", "b", &[0.0, 1.0]).unwrap();
    store.save_all(dir.path()).unwrap();

    let mut restored = VectorStore::default();
    assert_eq!(restored.load_all(dir.path()).unwrap(), 2);
    assert_eq!(restored.list_collections(), vec!["team alpha", "team/alpha"]);
    assert_eq!(
        restored.get_vector_by_fingerprint("team/alpha", "a").unwrap(),
        vec![1.0, 0.0]
    );
    assert_eq!(
        restored.get_vector_by_fingerprint("team alpha", "b").unwrap(),
        vec![0.0, 1.0]
    );
}

#[test]
fn test_save_all_suffixed_stem_does_not_collide() {
    let dir = Builder::new().prefix("vds_store").tempdir().unwrap();

    // "a b" and "a_b" both sanitize to "a_b"; the suffixed "a_b-1" must not
    // land on the literal collection "a_b-1".
    let mut store = VectorStore::new(VectorStoreConfig::builder().default_dimension(2).build()).unwrap();
    store.add_vector("a b", "x1", &[1.0, 0.0]).unwrap();
    store.add_vector("a_b", "x2", &[0.0, 1.0]).unwrap();
    store.add_vector("a_b-1", "x3", &[1.0, 1.0]).unwrap();
    store.save_all(dir.path()).unwrap();

    let mut restored = VectorStore::default();
    assert_eq!(restored.load_all(dir.path()).unwrap(), 3);
    assert_eq!(restored.list_fingerprints("a b", true).unwrap(), vec!["x1"]);
    assert_eq!(restored.list_fingerprints("a_b", true).unwrap(), vec!["x2"]);
    assert_eq!(restored.list_fingerprints("a_b-1", true).unwrap(), vec!["x3"]);
    assert_eq!(
        restored.get_vector_by_fingerprint("a_b-1", "x3").unwrap(),
        vec![1.0, 1.0]
    );
}

#[test]
fn test_commit_requires_storage_dir() {
    let store = docs_store();
    assert!(matches!(store.commit(), Err(VdsError::InvalidConfig(_))));
}
