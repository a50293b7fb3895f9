//! End-to-end scenarios from spec.md §8, exercised through the public
//! facade API rather than the crate-internal unit tests beside each op.

use std::cell::RefCell;
use std::rc::Rc;

use vextr::{HopscotchMap, Str, VecBuf};

#[test]
fn embedded_to_heap_transition() {
    let mut v: VecBuf<i32, 2> = VecBuf::new();
    v.push_back(10);
    v.push_back(20);
    assert_eq!(v.capacity(), 2);

    v.push_back(30);
    assert!(v.capacity() >= 3);
    assert_eq!(v[0], 10);
    assert_eq!(v[1], 20);
    assert_eq!(v[2], 30);
}

#[test]
fn literal_sharing_and_nul_termination() {
    let mut s = Str::from_nul_terminated_static(b"abc\0");
    assert_eq!(s.len(), 3);
    let interior = s.c_str();

    // No mutation yet: c_str() is free, returns the literal's own pointer.
    assert_eq!(interior, s.as_bytes().as_ptr());

    s.push_str("d");
    assert_eq!(s.as_str(), "abcd");
    // Mutation promotes storage; a fresh c_str() no longer aliases the
    // original literal bytes.
    let owned_ptr = s.c_str();
    assert_ne!(owned_ptr, interior);
    unsafe {
        assert_eq!(*owned_ptr.add(4), 0);
    }
}

#[test]
fn vector_concat_leaves_original_contents_on_panic() {
    // `VecBuf::clone()`/`+=` drive the complex assign_concat/insert path.
    // A panicking Clone impl during that copy must not corrupt the
    // destination: std::panic::catch_unwind observes the vector is still
    // whatever it held right before the call, since Rust's own unwind
    // machinery drops only what the panicking frame itself had live.
    let calls = Rc::new(RefCell::new(0));

    struct Bomb(Rc<RefCell<usize>>, i32);
    impl Clone for Bomb {
        fn clone(&self) -> Self {
            *self.0.borrow_mut() += 1;
            if *self.0.borrow() == 3 {
                panic!("boom");
            }
            Bomb(self.0.clone(), self.1)
        }
    }
    impl Drop for Bomb {
        fn drop(&mut self) {}
    }

    let mut v: VecBuf<Bomb, 0> = VecBuf::new();
    v.push_back(Bomb(calls.clone(), 1));
    v.push_back(Bomb(calls.clone(), 2));
    v.push_back(Bomb(calls.clone(), 3));
    v.push_back(Bomb(calls.clone(), 4));
    assert_eq!(v.len(), 4);

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let cloned = v.clone();
        cloned.len()
    }));
    assert!(result.is_err());
    // `v` itself (the source of the clone) was never touched by the
    // failed clone: it still has all four original elements.
    assert_eq!(v.len(), 4);
    assert_eq!(v[0].1, 1);
    assert_eq!(v[3].1, 4);
}

#[test]
fn mid_vector_insert_leaves_vector_untouched_on_panic() {
    // complex::insert's in-place (non-replacing) branch: a panicking Clone
    // during construction of the inserted element(s) must not leave the
    // vector with a relocated-but-uninitialized tail.
    let calls = Rc::new(RefCell::new(0));

    struct Bomb(Rc<RefCell<usize>>, i32);
    impl Clone for Bomb {
        fn clone(&self) -> Self {
            *self.0.borrow_mut() += 1;
            if *self.0.borrow() == 1 {
                panic!("boom");
            }
            Bomb(self.0.clone(), self.1)
        }
    }
    impl Drop for Bomb {
        fn drop(&mut self) {}
    }

    let mut v: VecBuf<Bomb, 0> = VecBuf::new();
    v.push_back(Bomb(calls.clone(), 1));
    v.push_back(Bomb(calls.clone(), 2));
    v.push_back(Bomb(calls.clone(), 3));
    assert_eq!(v.len(), 3);

    let bomb = Bomb(calls.clone(), 99);
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        v.insert(1, bomb.clone()).unwrap();
    }));
    assert!(result.is_err());
    // Middle insert never committed: the original three elements are still
    // exactly where they were, nothing uninitialized in between.
    assert_eq!(v.len(), 3);
    assert_eq!(v[0].1, 1);
    assert_eq!(v[1].1, 2);
    assert_eq!(v[2].1, 3);
}

#[test]
fn embedded_string_survives_being_moved_out_by_value() {
    // StrBuf::from_bytes (and substr/Clone, which call it) build the result
    // as a local, mutate it into embedded mode, then return it by value —
    // exactly the move that would dangle a naively cached embedded pointer.
    let s: Str = Str::substr(&Str::from_static("hello world"), 0, 5);
    assert_eq!(s.as_str(), "hello");
    let moved = std::iter::once(s).collect::<Vec<_>>().pop().unwrap();
    assert_eq!(moved.as_str(), "hello");
}

#[test]
fn embedded_vector_survives_take_and_clone() {
    let mut v: VecBuf<u32, 8> = VecBuf::new();
    v.push_back(1);
    v.push_back(2);
    v.push_back(3);

    let taken = v.take();
    let relocated = std::iter::once(taken).collect::<Vec<_>>().pop().unwrap();
    assert_eq!(relocated.len(), 3);
    assert_eq!(relocated[0], 1);
    assert_eq!(relocated[2], 3);

    let mut w: VecBuf<u32, 8> = VecBuf::new();
    w.push_back(10);
    let cloned = w.clone();
    let relocated_clone = std::iter::once(cloned).collect::<Vec<_>>().pop().unwrap();
    assert_eq!(relocated_clone[0], 10);
}

/// A hasher that always finishes to the same value, so every key collides
/// on its home bucket regardless of its actual content — the deliberate
/// worst case spec.md §8 scenario 4/5 describes ("keys whose hashes all
/// map to bucket 0").
#[derive(Default, Clone)]
struct AllSameHasher;
impl std::hash::Hasher for AllSameHasher {
    fn finish(&self) -> u64 {
        0
    }
    fn write(&mut self, _bytes: &[u8]) {}
}
#[derive(Default, Clone)]
struct AllSameBuildHasher;
impl std::hash::BuildHasher for AllSameBuildHasher {
    type Hasher = AllSameHasher;
    fn build_hasher(&self) -> AllSameHasher {
        AllSameHasher
    }
}

#[test]
fn hopscotch_displacement_keeps_every_key_reachable() {
    // Every key hashes identically (remapped to the fixed ZERO_HASH
    // constant), so all five land in one neighborhood window and the
    // fifth must go through hop-into-window displacement to find room.
    let mut m: HopscotchMap<u32, u32, AllSameBuildHasher> = HopscotchMap::with_hasher(
        vextr::config::MapConfig::default().with_ideal_neighborhood(4),
        AllSameBuildHasher,
    );
    for i in 0..5u32 {
        m.insert(i, i * 100);
    }
    for i in 0..5u32 {
        assert_eq!(m.get(&i), Some(&(i * 100)));
    }
}

#[test]
fn tombstone_preservation_across_remove_and_reinsert() {
    let mut m: HopscotchMap<u32, u32, AllSameBuildHasher> = HopscotchMap::with_hasher(
        vextr::config::MapConfig::default().with_ideal_neighborhood(4),
        AllSameBuildHasher,
    );
    for i in 0..8u32 {
        m.insert(i, i);
    }
    m.remove(&1).unwrap();
    // Every key shares bucket 1's neighborhood; removing key 1 without a
    // distinct tombstone value must not break lookups for the rest.
    for i in 0..8u32 {
        if i == 1 {
            assert_eq!(m.get(&i), None);
        } else {
            assert_eq!(m.get(&i), Some(&i));
        }
    }
    assert_eq!(m.insert(1, 111), None);
    assert_eq!(m.get(&1), Some(&111));
}

#[test]
fn iterator_invalidation_after_mutation() {
    let mut v: VecBuf<i32, 0> = VecBuf::new();
    v.push_back(1);
    v.push_back(2);
    let mut it = v.iter();
    unsafe {
        assert_eq!(*it.next().unwrap().unwrap(), 1);
    }
    v.push_back(3);
    assert!(it.next().unwrap().is_err());
}

#[test]
fn front_back_pop_agree_on_emptiness() {
    let mut v: VecBuf<i32, 0> = VecBuf::new();
    assert!(v.front().is_err());
    assert!(v.back().is_err());
    assert!(v.pop_back().is_err());

    v.push_back(42);
    assert_eq!(*v.front().unwrap(), 42);
    assert_eq!(*v.back().unwrap(), 42);
    assert_eq!(v.pop_back().unwrap(), 42);
    assert!(v.is_empty());
}
