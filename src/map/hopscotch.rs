//! The hopscotch open-addressed hash map: spec.md §4.7, grounded in
//! `original_source/include/abaclade/collections/map.hxx`. Three parallel
//! heap arrays (hashes, keys, values) addressed through `NonNull`,
//! allocated/freed through `crate::memory`, the same manual-`Layout` idiom
//! the teacher's `index/hash/table.rs` uses for its own bucket array —
//! adapted here to hopscotch's neighborhood-displacement scheme instead of
//! the teacher's SwissTable-style control-byte groups.

use std::alloc::Layout;
use std::hash::{BuildHasher, Hash};
use std::mem::MaybeUninit;
use std::ptr::NonNull;

use fxhash::FxBuildHasher;

use crate::config::MapConfig;
use crate::error::{Result, VextrError};
use crate::hint;
use crate::map::iter::MapIter;
use crate::memory;

/// Reserved hash value meaning "this bucket is empty".
const EMPTY_HASH: u64 = 0;
/// A real hash that happens to equal `EMPTY_HASH` is remapped to this —
/// the largest prime below 2^16, exactly the constant the original map
/// uses for the same purpose (`smc_iZeroHash`).
const ZERO_HASH: u64 = 65521;
/// Smallest bucket count a non-empty table ever has (`smc_cBucketsMin`).
const BUCKETS_MIN: usize = 8;
/// Growth factor applied to both the bucket count and the neighborhood
/// size under sustained pressure (`smc_iGrowthFactor`).
const GROWTH: usize = 4;
/// Load factor threshold (numerator/8) above which the table grows before
/// the next insert, matching the teacher's `RawTable` 7/8 threshold.
const MAX_LOAD_NUM: usize = 7;
const MAX_LOAD_DEN: usize = 8;

/// An open-addressed hash map using hopscotch displacement to keep every
/// key within a small, bounded neighborhood of its ideal bucket.
pub struct HopscotchMap<K, V, S = FxBuildHasher> {
    hashes: NonNull<u64>,
    keys: NonNull<MaybeUninit<K>>,
    values: NonNull<MaybeUninit<V>>,
    capacity: usize,
    len: usize,
    neighborhood: usize,
    ideal_neighborhood: usize,
    revision: u64,
    hash_builder: S,
}

impl<K: Hash + Eq, V> HopscotchMap<K, V, FxBuildHasher> {
    pub fn new() -> Self {
        Self::with_config(MapConfig::default())
    }

    pub fn with_config(config: MapConfig) -> Self {
        Self::with_hasher(config, FxBuildHasher::default())
    }
}

impl<K: Hash + Eq, V> Default for HopscotchMap<K, V, FxBuildHasher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> HopscotchMap<K, V, S> {
    pub fn with_hasher(config: MapConfig, hash_builder: S) -> Self {
        HopscotchMap {
            hashes: NonNull::dangling(),
            keys: NonNull::dangling(),
            values: NonNull::dangling(),
            capacity: 0,
            len: 0,
            neighborhood: config.ideal_neighborhood,
            ideal_neighborhood: config.ideal_neighborhood,
            revision: 0,
            hash_builder,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn raw_parts(&self) -> (NonNull<u64>, NonNull<MaybeUninit<K>>, NonNull<MaybeUninit<V>>, usize) {
        (self.hashes, self.keys, self.values, self.capacity)
    }

    fn mask(&self) -> usize {
        self.capacity - 1
    }

    fn hash_of(&self, key: &K) -> u64 {
        let mut hasher = self.hash_builder.build_hasher();
        key.hash(&mut hasher);
        let raw = std::hash::Hasher::finish(&hasher);
        if raw == EMPTY_HASH {
            ZERO_HASH
        } else {
            raw
        }
    }

    fn home_index(&self, hash: u64) -> usize {
        (hash as usize) & self.mask()
    }

    #[inline]
    unsafe fn hash_at(&self, idx: usize) -> u64 {
        *self.hashes.as_ptr().add(idx)
    }

    #[inline]
    unsafe fn set_hash_at(&mut self, idx: usize, hash: u64) {
        *self.hashes.as_ptr().add(idx) = hash;
    }

    /// Scans the `neighborhood`-sized window starting at `home` for `key`,
    /// returning its bucket index if present (spec.md's `lookup_key`).
    fn find_index(&self, hash: u64, key: &K) -> Option<usize> {
        if self.capacity == 0 {
            return None;
        }
        let home = self.home_index(hash);
        for step in 0..self.neighborhood.min(self.capacity) {
            let idx = (home + step) & self.mask();
            // Safety: idx < capacity, arrays are that large.
            unsafe {
                if hint::unlikely(self.hash_at(idx) == hash) {
                    let stored = (*self.keys.as_ptr().add(idx)).assume_init_ref();
                    if stored == key {
                        return Some(idx);
                    }
                }
            }
        }
        None
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let hash = self.hash_of(key);
        let idx = self.find_index(hash, key)?;
        // Safety: idx was returned by find_index, so it's a live slot.
        Some(unsafe { (*self.values.as_ptr().add(idx)).assume_init_ref() })
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let hash = self.hash_of(key);
        let idx = self.find_index(hash, key)?;
        // Safety: idx was returned by find_index, so it's a live slot.
        Some(unsafe { (*self.values.as_ptr().add(idx)).assume_init_mut() })
    }

    /// Inserts `key` → `value`, returning the previous value if `key` was
    /// already present (spec.md's `add_or_assign`).
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.ensure_room_for_one_more();
        let hash = self.hash_of(&key);
        if let Some(idx) = self.find_index(hash, &key) {
            // Safety: idx is live; replace its value in place.
            let slot = unsafe { &mut *self.values.as_ptr().add(idx) };
            let old = std::mem::replace(slot, MaybeUninit::new(value));
            self.revision = self.revision.wrapping_add(1);
            return Some(unsafe { old.assume_init() });
        }
        self.insert_new(hash, key, value);
        self.len += 1;
        self.revision = self.revision.wrapping_add(1);
        None
    }

    pub fn remove(&mut self, key: &K) -> Result<V> {
        let hash = self.hash_of(key);
        let idx = match self.find_index(hash, key) {
            Some(idx) => idx,
            None => return Err(VextrError::KeyNotFound),
        };
        // Safety: idx is live; take ownership of both fields then mark empty.
        unsafe {
            let stored_key = (*self.keys.as_ptr().add(idx)).assume_init_read();
            let stored_value = (*self.values.as_ptr().add(idx)).assume_init_read();
            drop(stored_key);
            self.set_hash_at(idx, EMPTY_HASH);
            self.len -= 1;
            self.revision = self.revision.wrapping_add(1);
            Ok(stored_value)
        }
    }

    pub fn iter(&self) -> MapIter<K, V, S> {
        MapIter::new(self)
    }

    fn ensure_room_for_one_more(&mut self) {
        if self.capacity == 0 {
            self.grow_table(BUCKETS_MIN);
        } else if (self.len + 1) * MAX_LOAD_DEN > self.capacity * MAX_LOAD_NUM {
            self.grow_table(self.capacity * GROWTH);
        }
    }

    /// Places a not-yet-present `key`/`value` pair, using hopscotch
    /// displacement to make room within `home`'s neighborhood window if it
    /// isn't already free (spec.md's `get_empty_bucket_for_key` plus
    /// `grow_neighborhoods`/`grow_table`).
    fn insert_new(&mut self, hash: u64, key: K, value: V) {
        let home = self.home_index(hash);
        let window = self.neighborhood.min(self.capacity);
        for step in 0..window {
            let idx = (home + step) & self.mask();
            // Safety: idx < capacity.
            if hint::likely(unsafe { self.hash_at(idx) } == EMPTY_HASH) {
                self.write_bucket(idx, hash, key, value);
                return;
            }
        }

        let free = self.find_any_empty_bucket();
        match self.hop_into_window(home, free) {
            Some(idx) => self.write_bucket(idx, hash, key, value),
            None => {
                // Displacement couldn't bring an empty slot within range;
                // a bigger table gives every key more room and always
                // terminates this recursion (capacity strictly grows).
                self.grow_table(self.capacity * GROWTH);
                self.insert_new(hash, key, value);
            }
        }
    }

    fn write_bucket(&mut self, idx: usize, hash: u64, key: K, value: V) {
        // Safety: idx < capacity, and the caller has established the slot
        // is empty (hash_at(idx) == EMPTY_HASH).
        unsafe {
            self.set_hash_at(idx, hash);
            (*self.keys.as_ptr().add(idx)).write(key);
            (*self.values.as_ptr().add(idx)).write(value);
        }
    }

    /// Linear scan for any empty bucket, starting just past `home`'s
    /// window and wrapping around the whole table. Always terminates
    /// within `capacity` steps because `ensure_room_for_one_more` keeps the
    /// load factor under the threshold, guaranteeing at least one hole.
    fn find_any_empty_bucket(&self) -> usize {
        let mask = self.mask();
        for step in 0..self.capacity {
            let idx = step & mask;
            // Safety: idx < capacity.
            if unsafe { self.hash_at(idx) } == EMPTY_HASH {
                return idx;
            }
        }
        unreachable!("load factor invariant guarantees a free bucket exists")
    }

    /// Repeatedly relocates an occupied bucket closer to `home` (swapping
    /// the empty slot backward toward it) until the empty slot lands
    /// inside `home`'s neighborhood window, or no candidate bucket can be
    /// moved any closer (`None`).
    fn hop_into_window(&mut self, home: usize, mut free: usize) -> Option<usize> {
        let mask = self.mask();
        loop {
            let dist = (free + self.capacity - home) % self.capacity;
            if dist < self.neighborhood.min(self.capacity) {
                return Some(free);
            }
            let mut moved = None;
            let reach = self.neighborhood.min(self.capacity).saturating_sub(1).max(1);
            for back in (1..=reach).rev() {
                let j = (free + self.capacity - back) & mask;
                // Safety: j < capacity.
                let j_hash = unsafe { self.hash_at(j) };
                if j_hash == EMPTY_HASH {
                    continue;
                }
                let j_home = self.home_index(j_hash);
                let dist_if_moved = (free + self.capacity - j_home) % self.capacity;
                if dist_if_moved < self.neighborhood.min(self.capacity) {
                    // Safety: j is live, free is empty; relocate j -> free.
                    unsafe {
                        self.set_hash_at(free, j_hash);
                        let moved_key = (*self.keys.as_ptr().add(j)).assume_init_read();
                        let moved_value = (*self.values.as_ptr().add(j)).assume_init_read();
                        (*self.keys.as_ptr().add(free)).write(moved_key);
                        (*self.values.as_ptr().add(free)).write(moved_value);
                        self.set_hash_at(j, EMPTY_HASH);
                    }
                    moved = Some(j);
                    break;
                }
            }
            match moved {
                Some(j) => free = j,
                None => return None,
            }
        }
    }

    /// Reallocates all three arrays at `new_capacity` (rounded up to a
    /// power of two) and reinserts every live entry (spec.md's
    /// `grow_table`). Also widens the neighborhood by `GROWTH` once the
    /// table itself has grown past its first allocation, so larger tables
    /// get proportionally larger displacement windows.
    fn grow_table(&mut self, min_capacity: usize) {
        let new_capacity = min_capacity.max(BUCKETS_MIN).next_power_of_two();
        let new_hashes = alloc_array::<u64>(new_capacity);
        // Safety: fresh allocation, writing EMPTY_HASH (0) to every slot.
        unsafe {
            std::ptr::write_bytes(new_hashes.as_ptr(), 0, new_capacity);
        }
        let new_keys = alloc_array::<MaybeUninit<K>>(new_capacity);
        let new_values = alloc_array::<MaybeUninit<V>>(new_capacity);

        let old = (self.hashes, self.keys, self.values, self.capacity);
        self.hashes = new_hashes;
        self.keys = new_keys;
        self.values = new_values;
        let old_capacity = self.capacity;
        self.capacity = new_capacity;
        if old_capacity > 0 {
            self.neighborhood = (self.neighborhood * GROWTH).min(new_capacity).max(self.ideal_neighborhood);
        }

        if old_capacity > 0 {
            for idx in 0..old_capacity {
                // Safety: idx < old_capacity, arrays sized old_capacity.
                let hash = unsafe { *old.0.as_ptr().add(idx) };
                if hash == EMPTY_HASH {
                    continue;
                }
                // Safety: slot was live in the old table.
                let (key, value) = unsafe {
                    (
                        (*old.1.as_ptr().add(idx)).assume_init_read(),
                        (*old.2.as_ptr().add(idx)).assume_init_read(),
                    )
                };
                self.insert_new(hash, key, value);
            }
            dealloc_array(old.0, old_capacity);
            dealloc_array(old.1, old_capacity);
            dealloc_array(old.2, old_capacity);
        }
    }
}

impl<K, V, S> Drop for HopscotchMap<K, V, S> {
    fn drop(&mut self) {
        if self.capacity == 0 {
            return;
        }
        for idx in 0..self.capacity {
            // Safety: idx < capacity.
            unsafe {
                if *self.hashes.as_ptr().add(idx) != EMPTY_HASH {
                    (*self.keys.as_ptr().add(idx)).assume_init_drop();
                    (*self.values.as_ptr().add(idx)).assume_init_drop();
                }
            }
        }
        dealloc_array(self.hashes, self.capacity);
        dealloc_array(self.keys, self.capacity);
        dealloc_array(self.values, self.capacity);
    }
}

fn alloc_array<T>(count: usize) -> NonNull<T> {
    let layout = Layout::array::<T>(count).expect("hopscotch bucket array layout overflow");
    memory::alloc_bytes(layout).cast()
}

fn dealloc_array<T>(ptr: NonNull<T>, count: usize) {
    let layout = Layout::array::<T>(count).expect("hopscotch bucket array layout overflow");
    // Safety: ptr/layout match a prior alloc_array::<T>(count) call.
    unsafe {
        memory::dealloc_bytes(ptr.cast(), layout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove_round_trip() {
        let mut m: HopscotchMap<String, i32> = HopscotchMap::new();
        assert_eq!(m.insert("a".to_string(), 1), None);
        assert_eq!(m.insert("b".to_string(), 2), None);
        assert_eq!(m.get(&"a".to_string()), Some(&1));
        assert_eq!(m.insert("a".to_string(), 10), Some(1));
        assert_eq!(m.get(&"a".to_string()), Some(&10));
        assert_eq!(m.remove(&"b".to_string()).unwrap(), 2);
        assert!(matches!(m.remove(&"b".to_string()), Err(VextrError::KeyNotFound)));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn survives_growth_with_many_keys() {
        let mut m: HopscotchMap<u64, u64> = HopscotchMap::new();
        for i in 0..2000u64 {
            m.insert(i, i * 2);
        }
        assert_eq!(m.len(), 2000);
        for i in 0..2000u64 {
            assert_eq!(m.get(&i), Some(&(i * 2)));
        }
        for i in (0..2000u64).step_by(3) {
            assert_eq!(m.remove(&i).unwrap(), i * 2);
        }
        for i in 0..2000u64 {
            if i % 3 == 0 {
                assert_eq!(m.get(&i), None);
            } else {
                assert_eq!(m.get(&i), Some(&(i * 2)));
            }
        }
    }

    #[test]
    fn tombstone_free_removal_preserves_other_lookups() {
        let mut m: HopscotchMap<i32, i32> = HopscotchMap::with_config(
            MapConfig::default().with_ideal_neighborhood(4),
        );
        for i in 0..20 {
            m.insert(i, i);
        }
        m.remove(&5).unwrap();
        m.remove(&6).unwrap();
        for i in 0..20 {
            if i == 5 || i == 6 {
                assert_eq!(m.get(&i), None);
            } else {
                assert_eq!(m.get(&i), Some(&i));
            }
        }
    }

    #[test]
    fn dropping_the_map_drops_every_live_value() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let counter = Rc::new(RefCell::new(0));
        {
            let mut m: HopscotchMap<i32, Rc<RefCell<i32>>> = HopscotchMap::new();
            for i in 0..50 {
                *counter.borrow_mut() += 1;
                m.insert(i, counter.clone());
            }
            assert_eq!(Rc::strong_count(&counter), 51);
        }
        assert_eq!(Rc::strong_count(&counter), 1);
    }
}
