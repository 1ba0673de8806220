//! Benchmarks for Merkle B-tree operations

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mbt_blockstore::MemoryBlockStore;
use mbt_core::{KeyEntry, MerkleBTree, TreeConfig};
use std::sync::Arc;
use tokio::runtime::Runtime;

fn create_tree(max_children: usize) -> MerkleBTree<String, MemoryBlockStore> {
    let store = Arc::new(MemoryBlockStore::new());
    MerkleBTree::with_config(store, TreeConfig::new(max_children))
}

fn populated_tree(rt: &Runtime, count: usize) -> MerkleBTree<String, MemoryBlockStore> {
    let mut tree = create_tree(32);
    rt.block_on(async {
        for i in 0..count {
            tree.put(&format!("key-{:08}", i), format!("value-{}", i))
                .await
                .unwrap();
        }
    });
    tree
}

fn bench_insert(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("btree_insert");

    for size in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                rt.block_on(async {
                    let mut tree = create_tree(32);
                    for i in 0..size {
                        let key = format!("key-{:08}", i);
                        tree.put(&key, format!("value-{}", i)).await.unwrap();
                    }
                    black_box(tree.root_hash())
                })
            });
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let tree = populated_tree(&rt, 1000);

    let mut group = c.benchmark_group("btree_lookup");

    group.bench_function("existing_key", |b| {
        b.iter(|| rt.block_on(async { black_box(tree.get("key-00000500").await.unwrap()) }));
    });

    group.bench_function("missing_key", |b| {
        b.iter(|| rt.block_on(async { black_box(tree.get("nonexistent").await.unwrap()) }));
    });

    group.finish();
}

fn bench_range_scan(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let tree = populated_tree(&rt, 1000);

    let mut group = c.benchmark_group("btree_range");

    for limit in [10, 100].iter() {
        group.bench_with_input(BenchmarkId::new("forward", limit), limit, |b, &limit| {
            b.iter(|| {
                rt.block_on(async {
                    let results = tree
                        .search_range(Some("key-00000200"), None, Some(limit), true, true, false)
                        .await
                        .unwrap();
                    black_box(results)
                })
            });
        });
        group.bench_with_input(BenchmarkId::new("reverse", limit), limit, |b, &limit| {
            b.iter(|| {
                rt.block_on(async {
                    let results = tree
                        .search_range(None, Some("key-00000800"), Some(limit), true, true, true)
                        .await
                        .unwrap();
                    black_box(results)
                })
            });
        });
    }

    group.bench_function("prefix", |b| {
        b.iter(|| rt.block_on(async { black_box(tree.search("key-000005", None).await.unwrap()) }));
    });

    group.finish();
}

fn bench_delete(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("btree_delete", |b| {
        b.iter_batched(
            || populated_tree(&rt, 200),
            |mut tree| {
                rt.block_on(async {
                    for i in (0..200).step_by(4) {
                        tree.delete(&format!("key-{:08}", i)).await.unwrap();
                    }
                    black_box(tree.root_hash())
                })
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_bulk_load(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("btree_bulk_load");

    for size in [100, 1000, 10000].iter() {
        let list: Vec<KeyEntry<String>> = (0..*size)
            .map(|i| KeyEntry::leaf(format!("key-{:08}", i), format!("value-{}", i)))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &list, |b, list| {
            b.iter(|| {
                rt.block_on(async {
                    let store = Arc::new(MemoryBlockStore::new());
                    let tree =
                        MerkleBTree::from_sorted_list(list.clone(), store, TreeConfig::new(32))
                            .await
                            .unwrap();
                    black_box(tree.root_hash())
                })
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_insert,
    bench_lookup,
    bench_range_scan,
    bench_delete,
    bench_bulk_load
);
criterion_main!(benches);
