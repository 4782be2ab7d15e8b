//! Criterion benchmarks for the shard cache and sharded index.
//!
//! Run with:
//! ```bash
//! cargo bench -p tessera-core
//! ```

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use tessera_common::types::{AttributeId, ObjectId, ObjectLocation, TypeId};
use tessera_core::cache::CacheConfig;
use tessera_core::index::{IndexResources, ShardCache};
use tessera_core::{
    AttributeCatalog, AttributeDescriptor, AttributeIndex, CompositeKey, CompositeKeyDefinition,
    DbObject, IndexConfig, IndexMetadata, MemoryShardStore, ShardedAttributeIndex,
};

const AGE: AttributeId = AttributeId::new(1);
const PEOPLE: TypeId = TypeId::new(1);

fn resources(capacity: usize) -> IndexResources {
    let catalog = AttributeCatalog::new();
    catalog.define(AttributeDescriptor::single(AGE, "age", 0i64));
    IndexResources {
        cache: Arc::new(ShardCache::new(CacheConfig { capacity })),
        store: Arc::new(MemoryShardStore::new()),
        resolver: Arc::new(catalog),
    }
}

fn build_index(shard_count: u32, capacity: usize) -> ShardedAttributeIndex {
    let index = ShardedAttributeIndex::new("by_age", resources(capacity));
    let metadata = IndexMetadata::new(
        "by_age",
        PEOPLE,
        ObjectLocation::new("/People/"),
        CompositeKeyDefinition::new([AGE]),
    )
    .with_config(IndexConfig::default().with_shard_count(shard_count));
    index.initialize(metadata).unwrap();
    index
}

fn person(id: u64) -> DbObject {
    DbObject::new(ObjectId::new(id), PEOPLE).with_attribute(AGE, (id % 1000) as i64)
}

fn populated(shard_count: u32, n: u64) -> ShardedAttributeIndex {
    let index = build_index(shard_count, 64 << 20);
    for id in 0..n {
        index.insert(&person(id)).unwrap();
    }
    index
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("index/insert");

    for &shards in &[1u32, 8, 32] {
        group.bench_with_input(BenchmarkId::new("batch_1000", shards), &shards, |b, &shards| {
            b.iter_batched(
                || build_index(shards, 64 << 20),
                |index| {
                    for id in 0..1000 {
                        index.insert(&person(id)).unwrap();
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("index/lookup");
    let index = populated(16, 10_000);

    group.bench_function("contains_key", |b| {
        let mut age = 0i64;
        b.iter(|| {
            age = (age + 7) % 1000;
            black_box(index.contains_key(&CompositeKey::single(age)).unwrap())
        });
    });

    group.bench_function("get_values", |b| {
        b.iter(|| black_box(index.get_values(&CompositeKey::single(500i64)).unwrap().len()));
    });

    group.finish();
}

fn bench_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("index/range");

    for &shards in &[1u32, 16] {
        let index = populated(shards, 10_000);
        group.bench_with_input(BenchmarkId::new("fan_out", shards), &shards, |b, _| {
            b.iter(|| {
                index
                    .range(&CompositeKey::single(100i64), &CompositeKey::single(200i64), true, false)
                    .unwrap()
                    .count()
            });
        });
    }

    group.finish();
}

fn bench_eviction_pressure(c: &mut Criterion) {
    let mut group = c.benchmark_group("index/eviction");

    group.bench_function("insert_small_cache", |b| {
        b.iter_batched(
            || build_index(16, 32 * 1024),
            |index| {
                for id in 0..1000 {
                    index.insert(&person(id)).unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_insert,
    bench_lookup,
    bench_range,
    bench_eviction_pressure
);
criterion_main!(benches);
