use citadel_vds::vector::distance::{dot, squared_l2};
use citadel_vds::{
    CollectionConfig, DeletionConfig, DistanceMetric, MemoryMetadataStore, Metadata,
    VectorIndexManager, VectorStore, VectorStoreConfig,
};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::Rng;
use std::hint::black_box;

fn generate_random_vector(dim: usize) -> Vec<f32> {
    let mut rng = rand::rng();
    (0..dim).map(|_| rng.random::<f32>()).collect()
}

fn build_manager(count: usize, dim: usize) -> VectorIndexManager {
    let config = VectorStoreConfig::builder()
        .collection("bench", CollectionConfig::new(dim, DistanceMetric::Euclidean))
        .build();
    let mut manager = VectorIndexManager::new(
        VectorStore::new(config).unwrap(),
        Box::new(MemoryMetadataStore::new()),
        DeletionConfig::default(),
    );
    for i in 0..count {
        manager
            .add_vector("bench", &format!("doc_{i}"), &generate_random_vector(dim), Metadata::new())
            .unwrap();
    }
    manager
}

fn bench_distance(c: &mut Criterion) {
    let mut group = c.benchmark_group("Distance");
    for dim in [128, 1536] {
        let a = generate_random_vector(dim);
        let b = generate_random_vector(dim);
        group.throughput(Throughput::Elements(dim as u64));
        group.bench_with_input(BenchmarkId::new("squared_l2", dim), &dim, |bench, _| {
            bench.iter(|| squared_l2(black_box(&a), black_box(&b)))
        });
        group.bench_with_input(BenchmarkId::new("dot", dim), &dim, |bench, _| {
            bench.iter(|| dot(black_box(&a), black_box(&b)))
        });
    }
    group.finish();
}

fn bench_flat_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("Flat Search");
    group.sample_size(20);
    let dim = 128;

    for count in [1000, 10000] {
        let manager = build_manager(count, dim);
        let query = generate_random_vector(dim);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                manager
                    .search_vectors("bench", black_box(&query), 10, false)
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_purge(c: &mut Criterion) {
    let mut group = c.benchmark_group("Purge");
    group.sample_size(10);
    let dim = 128;
    let count = 5000;

    group.bench_function("purge_half", |b| {
        b.iter_batched(
            || {
                let mut manager = build_manager(count, dim);
                for i in (0..count).step_by(2) {
                    manager.remove_vector("bench", &format!("doc_{i}")).unwrap();
                }
                manager
            },
            |mut manager| manager.purge_deleted("bench").unwrap(),
            criterion::BatchSize::LargeInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_distance, bench_flat_search, bench_purge);
criterion_main!(benches);
