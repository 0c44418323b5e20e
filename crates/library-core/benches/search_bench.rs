//! Library Core Search Benchmarks
//!
//! Benchmarks for the core vector-scan and catalog-resolution operations.
//! Run with: cargo bench -p library-core

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use library_core::storage::MemoryStorageBackend;
use library_core::volume::{cosine_similarity, Volume};
use library_core::Stacks;

fn unit_vector(dims: usize, seed: usize) -> Vec<f32> {
    let mut v: Vec<f32> = (0..dims).map(|j| ((seed * dims + j) as f32).sin()).collect();
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

fn bench_cosine_similarity(c: &mut Criterion) {
    let a = unit_vector(768, 1);
    let b = unit_vector(768, 2);

    c.bench_function("cosine_similarity_768d", |bencher| {
        bencher.iter(|| {
            black_box(cosine_similarity(&a, &b));
        })
    });
}

fn bench_vector_index_search(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let stacks = rt.block_on(async {
        let stacks = Stacks::new(std::sync::Arc::new(MemoryStorageBackend::new()));
        for i in 0..2_000 {
            stacks
                .add(&format!("volume {i}"), unit_vector(768, i), BTreeMap::new())
                .await
                .unwrap();
        }
        stacks
    });
    let query = unit_vector(768, 999);

    c.bench_function("linear_cosine_scan_2000x768d", |bencher| {
        bencher.iter(|| {
            rt.block_on(async {
                black_box(stacks.search(&query, 10, 0.0).await);
            })
        })
    });
}

fn bench_duplicate_groups(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let stacks = rt.block_on(async {
        let stacks = Stacks::new(std::sync::Arc::new(MemoryStorageBackend::new()));
        for i in 0..500 {
            // every third vector is a near-duplicate of i/3, to exercise the
            // union-find path rather than an all-singletons scan
            stacks
                .add(&format!("volume {i}"), unit_vector(768, i / 3), BTreeMap::new())
                .await
                .unwrap();
        }
        stacks
    });

    c.bench_function("find_duplicate_groups_500", |bencher| {
        bencher.iter(|| {
            rt.block_on(async {
                black_box(stacks.find_duplicate_groups(0.999).await);
            })
        })
    });
}

fn bench_volume_magnitude_check(c: &mut Criterion) {
    let v = Volume::new("id", "some stored text", unit_vector(768, 7), BTreeMap::new());
    c.bench_function("has_unit_embedding_768d", |bencher| {
        bencher.iter(|| {
            black_box(v.has_unit_embedding());
        })
    });
}

criterion_group!(
    benches,
    bench_cosine_similarity,
    bench_vector_index_search,
    bench_duplicate_groups,
    bench_volume_magnitude_check,
);
criterion_main!(benches);
