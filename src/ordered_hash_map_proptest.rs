#![cfg(test)]

// Property tests for OrderedHashMap kept inside the crate so they can use the
// budgeted test allocator.

use crate::error::Error;
use crate::ordered_hash_map::{MapConfig, OrderedHashMap};
use crate::ordered_list::Position;
use crate::pooled_alloc::PooledAllocator;
use crate::test_alloc::BudgetAllocator;
use proptest::prelude::*;
use std::collections::hash_map::RandomState;
use std::collections::HashMap;

// Pool-indexed operations so shrinking moves toward earlier keys and fewer ops.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    Assign(usize, i32),
    Remove(usize),
    EraseAt(usize),
    Get(usize),
    Mutate(usize, i32),
    Rehash(usize),
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=12).prop_flat_map(|pool| {
        let idx = 0..pool.len();
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Assign(i, v)),
            2 => idx.clone().prop_map(Op::Remove),
            1 => (0usize..16).prop_map(Op::EraseAt),
            1 => idx.clone().prop_map(Op::Get),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::Mutate(i, d)),
            1 => (0usize..64).prop_map(Op::Rehash),
            1 => Just(Op::Clear),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Property: state-machine equivalence against a Vec of pairs in insertion order.
// Invariants exercised across random operation sequences:
// - iteration yields exactly the model's pairs, in the model's order;
// - lookups agree with the model and positions stay stable while live;
// - erased positions never resolve again;
// - the load factor never exceeds the maximum after an insertion.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_matches_ordered_model((pool, ops) in arb_scenario()) {
        let config = MapConfig::default().with_bucket_count(2);
        let mut sut: OrderedHashMap<String, i32, RandomState, PooledAllocator> =
            OrderedHashMap::with_config_hasher_in(config, RandomState::new(), PooledAllocator::new());
        let mut model: Vec<(String, i32)> = Vec::new();
        let mut live: HashMap<String, Position> = HashMap::new();
        let mut stale: Vec<Position> = Vec::new();

        for op in ops {
            match op {
                Op::Insert(i, v) => {
                    let k = pool[i].clone();
                    let already = model.iter().any(|(mk, _)| *mk == k);
                    let (pos, fresh) = sut.insert(k.clone(), v).unwrap();
                    prop_assert_eq!(fresh, !already);
                    if fresh {
                        model.push((k.clone(), v));
                        live.insert(k, pos);
                        prop_assert!(sut.load_factor() <= sut.max_load_factor());
                    } else {
                        prop_assert_eq!(live.get(&k).copied(), Some(pos));
                    }
                }
                Op::Assign(i, v) => {
                    let k = pool[i].clone();
                    let (pos, fresh) = sut.insert_or_assign(k.clone(), v).unwrap();
                    match model.iter_mut().find(|(mk, _)| *mk == k) {
                        Some(slot) => {
                            prop_assert!(!fresh);
                            slot.1 = v;
                        }
                        None => {
                            prop_assert!(fresh);
                            model.push((k.clone(), v));
                            live.insert(k, pos);
                        }
                    }
                }
                Op::Remove(i) => {
                    let k = &pool[i];
                    let got = sut.remove(k.as_str());
                    let want = model.iter().position(|(mk, _)| mk == k).map(|at| model.remove(at).1);
                    prop_assert_eq!(got, want);
                    if let Some(pos) = live.remove(k) {
                        stale.push(pos);
                    }
                }
                Op::EraseAt(n) => {
                    if model.is_empty() {
                        continue;
                    }
                    let at = n % model.len();
                    let pos = sut.positions().nth(at).expect("position for live index");
                    let (k, v) = sut.erase(pos).unwrap();
                    prop_assert_eq!((k.clone(), v), model.remove(at));
                    live.remove(&k);
                    stale.push(pos);
                }
                Op::Get(i) => {
                    let k = &pool[i];
                    let want = model.iter().find(|(mk, _)| mk == k).map(|(_, v)| v);
                    prop_assert_eq!(sut.get(k.as_str()), want);
                    prop_assert_eq!(sut.find(k.as_str()), live.get(k).copied());
                }
                Op::Mutate(i, d) => {
                    let k = &pool[i];
                    if let Some(v) = sut.get_mut(k.as_str()) {
                        *v = v.wrapping_add(d);
                    }
                    if let Some((_, v)) = model.iter_mut().find(|(mk, _)| mk == k) {
                        *v = v.wrapping_add(d);
                    }
                }
                Op::Rehash(n) => {
                    let before = sut.bucket_count();
                    sut.rehash(n).unwrap();
                    let after = sut.bucket_count();
                    prop_assert!(after == before || after == n);
                }
                Op::Clear => {
                    sut.clear();
                    model.clear();
                    stale.extend(live.drain().map(|(_, p)| p));
                }
            }

            prop_assert_eq!(sut.len(), model.len());
            let got: Vec<(String, i32)> = sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
            prop_assert_eq!(&got, &model);
            for (k, pos) in &live {
                let (ek, _) = sut.entry_at(*pos).unwrap();
                prop_assert_eq!(ek, k);
            }
            for pos in &stale {
                prop_assert_eq!(sut.entry_at(*pos).err(), Some(Error::InvalidPosition));
            }
        }
    }
}

// Property: with a tight allocation budget, every insert either succeeds or
// leaves the map exactly as it was.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_failed_inserts_change_nothing(budget in 1usize..40, keys in proptest::collection::vec(0u16..64, 1..40)) {
        let alloc = BudgetAllocator::new(budget);
        let mut sut = OrderedHashMap::new_in(alloc);
        let mut model: Vec<u16> = Vec::new();
        for k in keys {
            let buckets = sut.bucket_count();
            match sut.insert(k, ()) {
                Ok((_, true)) => model.push(k),
                Ok((_, false)) => prop_assert!(model.contains(&k)),
                Err(e) => {
                    let out_of_memory = matches!(e, Error::OutOfMemory { .. });
                    prop_assert!(out_of_memory, "expected OutOfMemory, got {:?}", e);
                    prop_assert!(!sut.contains_key(&k));
                    prop_assert_eq!(sut.bucket_count(), buckets);
                }
            }
            let got: Vec<u16> = sut.keys().copied().collect();
            prop_assert_eq!(&got, &model);
        }
    }
}
