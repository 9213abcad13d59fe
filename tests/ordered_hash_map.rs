// OrderedHashMap public API suite.
//
// Core invariants exercised:
// - Order: iteration yields entries in insertion order; erase keeps the rest.
// - Uniqueness: inserting an existing key returns its position untouched.
// - Growth: the load factor stays within the maximum after every insertion.
// - Positions: valid until their entry is erased; foreign ones are rejected.
// - Pooling: list nodes, index entries and buckets share one pool.
use pooled_ordered_map::{
    CopyPolicy, Error, MapConfig, OrderedHashMap, PoolConfig, PooledAllocator,
};
use std::collections::hash_map::RandomState;

fn keys_of<S, A>(m: &OrderedHashMap<String, u32, S, A>) -> Vec<&str>
where
    S: std::hash::BuildHasher,
    A: pooled_ordered_map::Allocator + Clone,
{
    m.keys().map(String::as_str).collect()
}

// Test: the three-key scenario followed by growth past the default table.
// Verifies: order after erase, growth at the 13th entry, lookups afterwards.
#[test]
fn erase_then_grow() {
    let mut m = OrderedHashMap::new();
    for (i, k) in ["a", "b", "c"].into_iter().enumerate() {
        m.insert(k.to_string(), i as u32).unwrap();
    }
    let b = m.find("b").unwrap();
    m.erase(b).unwrap();
    assert_eq!(keys_of(&m), ["a", "c"]);

    for i in 0..20u32 {
        m.insert(format!("n{i}"), i).unwrap();
        assert!(m.load_factor() <= m.max_load_factor());
    }
    assert_eq!(m.len(), 22);
    assert!(m.bucket_count() > 16);
    assert_eq!(m.get("a"), Some(&0));
    assert_eq!(m.get("c"), Some(&2));
    assert_eq!(m.get("b"), None);
    assert_eq!(m.keys().nth(2).map(String::as_str), Some("n0"));
}

// Test: walking positions forward and backward.
#[test]
fn position_navigation() {
    let mut m = OrderedHashMap::new();
    for k in ["x", "y", "z"] {
        m.insert(k.to_string(), 0u32).unwrap();
    }
    let first = m.first_position().unwrap();
    let second = m.next_position(first).unwrap().unwrap();
    let third = m.next_position(second).unwrap().unwrap();
    assert_eq!(m.next_position(third).unwrap(), None);
    assert_eq!(m.prev_position(third).unwrap(), Some(second));
    assert_eq!(m.last_position(), Some(third));
    assert_eq!(m.entry_at(second).unwrap().0, "y");

    *m.value_at_mut(second).unwrap() = 9;
    assert_eq!(m.get("y"), Some(&9));

    m.erase(second).unwrap();
    assert_eq!(m.next_position(first).unwrap(), Some(third));
    assert_eq!(m.next_position(second), Err(Error::InvalidPosition));
}

// Test: a map over a small-chunk pool draws every structure from the pool.
// Verifies: the pool grows with the map and outlives the creating handle.
#[test]
fn map_draws_from_shared_pool() {
    let pool = PooledAllocator::with_config(PoolConfig::with_chunk_size(1024));
    let mut m = OrderedHashMap::new_in(pool.clone());
    for i in 0..200u32 {
        m.insert(format!("key{i}"), i).unwrap();
    }
    assert!(pool.chunk_count() > 1);
    assert!(pool.bytes_carved() > 0);
    drop(pool);
    for i in 0..200u32 {
        assert_eq!(m.get(&format!("key{i}")), Some(&i));
    }
}

// Test: two maps on one pool stay independent.
#[test]
fn maps_sharing_a_pool() {
    let pool = PooledAllocator::new();
    let mut a = OrderedHashMap::new_in(pool.clone());
    let mut b = OrderedHashMap::new_in(pool.clone());
    a.insert("k".to_string(), 1u32).unwrap();
    b.insert("k".to_string(), 2u32).unwrap();
    let pa = a.find("k").unwrap();
    assert_eq!(b.erase(pa), Err(Error::InvalidPosition));
    assert_eq!(a.get("k"), Some(&1));
    assert_eq!(b.get("k"), Some(&2));
    assert_eq!(a.allocator(), b.allocator());
}

// Test: copies are deep and follow the configured policy.
#[test]
fn copy_is_deep() {
    let pool = PooledAllocator::new();
    let config = MapConfig::default().with_copy_policy(CopyPolicy::SharePool);
    let mut m = OrderedHashMap::with_config_hasher_in(config, RandomState::new(), pool.clone());
    m.insert("a".to_string(), 1u32).unwrap();
    let mut c = m.try_clone().unwrap();
    c.insert("b".to_string(), 2).unwrap();
    *c.at_mut("a").unwrap() = 10;
    assert_eq!(keys_of(&m), ["a"]);
    assert_eq!(m.at("a"), Ok(&1));
    assert_eq!(keys_of(&c), ["a", "b"]);
    assert_eq!(c.allocator(), &pool);
    assert_eq!(c.bucket_count(), m.bucket_count());
}

// Test: extend keeps existing entries and appends new ones.
#[test]
fn extend_skips_existing() {
    let mut m: OrderedHashMap<String, u32> =
        [("a".to_string(), 1), ("b".to_string(), 2)].into_iter().collect();
    m.extend([("b".to_string(), 20), ("c".to_string(), 3)]);
    let got: Vec<(&str, u32)> = m.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    assert_eq!(got, [("a", 1), ("b", 2), ("c", 3)]);
}

// Test: clear empties the map but keeps it usable.
#[test]
fn clear_and_reuse() {
    let mut m = OrderedHashMap::new();
    for i in 0..40u32 {
        m.insert(i.to_string(), i).unwrap();
    }
    let buckets = m.bucket_count();
    let p = m.find("7").unwrap();
    m.clear();
    assert!(m.is_empty());
    assert_eq!(m.bucket_count(), buckets);
    assert_eq!(m.entry_at(p), Err(Error::InvalidPosition));
    m.insert("again".to_string(), 1).unwrap();
    assert_eq!(keys_of(&m), ["again"]);
}

// Test: reverse iteration mirrors forward iteration.
#[test]
fn reverse_iteration() {
    let m: OrderedHashMap<u32, u32> = (0..10).map(|i| (i, i * 2)).collect();
    let fwd: Vec<u32> = m.iter().map(|(k, _)| *k).collect();
    let mut rev: Vec<u32> = m.iter().rev().map(|(k, _)| *k).collect();
    rev.reverse();
    assert_eq!(fwd, rev);
    assert_eq!(m.iter().len(), 10);
}
