//! Map iteration, mirroring `facade::iter::VecIter`'s revision-check scheme
//! and its raw-pointer-not-borrow representation: a structural mutation
//! (insert/remove, or a grow triggered by either) bumps the map's revision
//! counter, and the iterator raises [`VextrError::IteratorInvalidated`] once
//! before stopping if it notices its snapshot is stale.

use std::hash::{BuildHasher, Hash};
use std::ptr::NonNull;

use crate::error::{Result, VextrError};
use crate::map::hopscotch::HopscotchMap;

/// # Safety
/// The `HopscotchMap` this was built from must outlive the iterator.
pub struct MapIter<K, V, S> {
    map: NonNull<HopscotchMap<K, V, S>>,
    revision: u64,
    index: usize,
}

impl<K: Hash + Eq, V, S: BuildHasher> MapIter<K, V, S> {
    pub(crate) fn new(map: &HopscotchMap<K, V, S>) -> Self {
        MapIter {
            map: NonNull::from(map),
            revision: map.revision(),
            index: 0,
        }
    }

    fn map(&self) -> &HopscotchMap<K, V, S> {
        // Safety: see the struct's safety note.
        unsafe { self.map.as_ref() }
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> Iterator for MapIter<K, V, S> {
    type Item = Result<(*const K, *const V)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.revision != self.map().revision() {
            self.index = usize::MAX;
            return Some(Err(VextrError::IteratorInvalidated));
        }
        if self.index == usize::MAX {
            return None;
        }
        let (hashes, keys, values, capacity) = self.map().raw_parts();
        while self.index < capacity {
            let idx = self.index;
            self.index += 1;
            // Safety: idx < capacity, and a nonzero hash marks a live slot
            // whose key/value were fully initialized by `insert`.
            unsafe {
                if *hashes.as_ptr().add(idx) != 0 {
                    let key = (*keys.as_ptr().add(idx)).assume_init_ref() as *const K;
                    let value = (*values.as_ptr().add(idx)).assume_init_ref() as *const V;
                    return Some(Ok((key, value)));
                }
            }
        }
        None
    }
}
