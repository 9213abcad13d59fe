// OrderedList public API suite.
//
// Core invariants exercised:
// - Order: elements appear in link order from front to back.
// - Stability: erasing one element leaves every other position valid.
// - Ownership: positions belong to one list; others are rejected.
// - Pooling: nodes drawn from a PooledAllocator share its chain.
use pooled_ordered_map::{Error, OrderedList, PooledAllocator};

#[test]
fn front_back_and_insert_before() {
    let mut l = OrderedList::new();
    let b = l.push_back("b").unwrap();
    l.push_back("d").unwrap();
    l.push_front("a").unwrap();
    let d = l.back_position().unwrap();
    l.insert_before(d, "c").unwrap();
    assert_eq!(l.iter().copied().collect::<Vec<_>>(), ["a", "b", "c", "d"]);
    assert_eq!(l.front(), Some(&"a"));
    assert_eq!(l.back(), Some(&"d"));
    assert_eq!(l.get(b), Some(&"b"));
}

// Test: erase in the middle keeps neighbours linked and positions valid.
#[test]
fn erase_keeps_other_positions() {
    let mut l = OrderedList::new();
    let ps: Vec<_> = (0..5).map(|i| l.push_back(i).unwrap()).collect();
    assert_eq!(l.erase(ps[2]), Ok(2));
    assert_eq!(l.erase(ps[2]), Err(Error::InvalidPosition));
    for (i, p) in ps.iter().enumerate().filter(|(i, _)| *i != 2) {
        assert_eq!(l.get(*p), Some(&(i as i32)));
    }
    assert_eq!(l.next_position(ps[1]).unwrap(), Some(ps[3]));
    assert_eq!(l.prev_position(ps[3]).unwrap(), Some(ps[1]));
    assert_eq!(l.len(), 4);
}

#[test]
fn foreign_positions_rejected() {
    let mut a = OrderedList::new();
    let mut b = OrderedList::new();
    let pa = a.push_back(1).unwrap();
    b.push_back(1).unwrap();
    assert_eq!(b.get(pa), None);
    assert_eq!(b.erase(pa), Err(Error::InvalidPosition));
    assert!(!b.contains(pa));
    assert!(a.contains(pa));
}

#[test]
fn resize_and_pop() {
    let mut l: OrderedList<u8> = OrderedList::new();
    l.resize(3).unwrap();
    assert_eq!(l.iter().copied().collect::<Vec<_>>(), [0, 0, 0]);
    l.resize_with(1, || 9).unwrap();
    assert_eq!(l.len(), 1);
    l.resize_with(3, || 9).unwrap();
    assert_eq!(l.pop_back(), Some(9));
    assert_eq!(l.pop_front(), Some(0));
    assert_eq!(l.len(), 1);
}

// Test: iter_mut and by-value iteration follow link order.
#[test]
fn mutable_and_owned_iteration() {
    let mut l: OrderedList<String> = ["x", "y"].iter().map(|s| s.to_string()).collect();
    for s in l.iter_mut() {
        s.push('!');
    }
    let owned: Vec<String> = l.into_iter().collect();
    assert_eq!(owned, ["x!", "y!"]);
}

// Test: a clone is deep, equal, and draws from an independent pool.
#[test]
fn pooled_clone_is_independent() {
    let pool = PooledAllocator::new();
    let mut l = OrderedList::new_in(pool.clone());
    l.extend(["a".to_string(), "b".to_string()]);
    let mut c = l.clone();
    assert_eq!(c, l);
    assert_ne!(c.allocator(), &pool);
    c.push_back("c".to_string()).unwrap();
    assert_eq!(l.len(), 2);
    assert_eq!(format!("{l:?}"), r#"["a", "b"]"#);
}

// Test: take moves elements and positions, leaving an empty usable list.
#[test]
fn take_moves_positions() {
    let mut l = OrderedList::new();
    let p = l.push_back(5).unwrap();
    let moved = l.take();
    assert!(l.is_empty());
    assert_eq!(moved.get(p), Some(&5));
    assert_eq!(l.get(p), None);
    l.push_back(6).unwrap();
    assert_eq!(l.len(), 1);
}
