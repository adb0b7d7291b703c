// benches/store_commit.rs

//! Commit throughput of the versioned store.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use nmx_core::store::{full_key, names, VersionedStore};

fn fill(store: &mut VersionedStore, writes: usize, round: u64) {
    for i in 0..writes {
        let name = names::ALL[i % names::ALL.len()];
        let key = full_key(name, &(i as u64).to_be_bytes());
        store.set(key, round.to_be_bytes().repeat(8));
    }
}

fn benchmark_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_commit");
    for writes in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(writes), &writes, |b, &writes| {
            let mut store = VersionedStore::new(names::ALL, 10);
            let mut round = 0u64;
            b.iter(|| {
                round += 1;
                fill(&mut store, writes, round);
                store.commit()
            });
        });
    }
    group.finish();
}

fn benchmark_working_hash(c: &mut Criterion) {
    let mut store = VersionedStore::new(names::ALL, 10);
    fill(&mut store, 10_000, 1);
    store.commit();
    let mut round = 1u64;
    c.bench_function("working_hash_after_100_writes", |b| {
        b.iter(|| {
            round += 1;
            fill(&mut store, 100, round);
            store.working_hash()
        })
    });
}

criterion_group!(benches, benchmark_commit, benchmark_working_hash);
criterion_main!(benches);
