use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use pooled_ordered_map::{Global, OrderedHashMap, PooledAllocator};
use std::collections::hash_map::RandomState;
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn filled<A: pooled_ordered_map::Allocator + Clone>(
    alloc: A,
    seed: u64,
    n: usize,
) -> OrderedHashMap<String, u64, RandomState, A> {
    let mut m = OrderedHashMap::new_in(alloc);
    for (i, x) in lcg(seed).take(n).enumerate() {
        m.insert(key(x), i as u64).unwrap();
    }
    m
}

fn bench_insert_fresh_100k(c: &mut Criterion) {
    c.bench_function("global::insert_fresh_100k", |b| {
        b.iter_batched(
            || (),
            |_| black_box(filled(Global, 1, 100_000)),
            BatchSize::SmallInput,
        )
    });
    c.bench_function("pooled::insert_fresh_100k", |b| {
        b.iter_batched(
            PooledAllocator::new,
            |alloc| black_box(filled(alloc, 1, 100_000)),
            BatchSize::SmallInput,
        )
    });
}

fn bench_lookup_hit_miss(c: &mut Criterion) {
    let n = 100_000;
    let m = filled(PooledAllocator::new(), 3, n);
    let hits: Vec<String> = lcg(3).take(n).map(key).collect();
    let misses: Vec<String> = lcg(4).take(n).map(key).collect();

    c.bench_function("pooled::get_hit_100k", |b| {
        b.iter(|| {
            let mut sum = 0u64;
            for k in &hits {
                sum = sum.wrapping_add(*m.get(k.as_str()).unwrap());
            }
            black_box(sum)
        })
    });
    c.bench_function("pooled::get_miss_100k", |b| {
        b.iter(|| {
            let mut found = 0usize;
            for k in &misses {
                found += m.contains_key(k.as_str()) as usize;
            }
            black_box(found)
        })
    });
}

fn bench_erase_churn(c: &mut Criterion) {
    c.bench_function("pooled::erase_reinsert_10k", |b| {
        b.iter_batched(
            || filled(PooledAllocator::new(), 5, 10_000),
            |mut m| {
                // Erase from the front and append, so the order keeps rotating.
                for i in 0..10_000u64 {
                    let pos = m.first_position().unwrap();
                    let (k, v) = m.erase(pos).unwrap();
                    m.insert(k, v.wrapping_add(i)).unwrap();
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_iterate_100k(c: &mut Criterion) {
    let m = filled(Global, 6, 100_000);
    c.bench_function("global::iter_100k", |b| {
        b.iter(|| black_box(m.values().fold(0u64, |a, v| a.wrapping_add(*v))))
    });
}

fn config() -> Criterion {
    Criterion::default()
        .sample_size(20)
        .measurement_time(Duration::from_secs(5))
}

criterion_group! {
    name = benches;
    config = config();
    targets = bench_insert_fresh_100k, bench_lookup_hit_miss, bench_erase_churn, bench_iterate_100k
}
criterion_main!(benches);
