//! Complex (non-trivial) element operations: spec.md §4.4. Elements are
//! handled through a type-erased [`TypeDescriptor`] vtable rather than
//! direct byte copies, since a non-`Copy` element's move/copy/drop glue
//! must actually run.

use std::alloc::Layout;
use std::ptr;
use std::ptr::NonNull;

use super::descriptor::TypeDescriptor;
use super::state::{VextrState, MAX_ALIGN};
use super::transaction::{EmbeddedSlot, VextrTransaction};
use crate::memory;

/// Destructs every element in `[begin, end)` through `desc`.
///
/// # Safety
/// Every element in the range must be live (constructed, not yet
/// destructed).
unsafe fn destruct_range(desc: &TypeDescriptor, begin: *mut u8, end: *mut u8) {
    if begin != end {
        (desc.destruct)(begin, end);
    }
}

/// Overwrites `state` with the concatenation of `left` (`left_len` elements
/// at `left_ptr`) and `right` (`right_len` elements at `right_ptr`),
/// spec.md §4.4's `assign_concat`.
///
/// `left_ptr` may alias `state`'s current array (the common "append to
/// self" case); `right_ptr` never does. When the work array reuses the
/// current array in place *and* `left_ptr` is that same array, a backup
/// copy of the to-be-overwritten elements is taken first so that if a
/// later element's copy-construct panics, the destructor run during
/// unwinding still sees live elements to destruct (and, per the documented
/// open question, so that — best-effort only — the original contents are
/// still around in the backup, though this code does not attempt to move
/// them back).
pub(crate) fn assign_concat(
    state: &mut VextrState,
    embedded: Option<EmbeddedSlot>,
    desc: &TypeDescriptor,
    left_ptr: *const u8,
    left_len: usize,
    right_ptr: *const u8,
    right_len: usize,
) {
    let total_len = left_len + right_len;
    let txn = VextrTransaction::for_resize(state, false, total_len * desc.size, embedded);
    let dst = txn.work_ptr();
    let replacing = txn.will_replace_array();
    let reusing_self_as_left = !replacing && left_ptr == state.begin as *const u8;

    if reusing_self_as_left {
        // The work array *is* the current array: constructing `right`'s
        // elements into the tail is safe (that region is uninitialized
        // past the old size), but we must guard against a panic mid-way
        // through so destructors run over a consistent range. We
        // construct right's elements first (order doesn't matter for
        // concat); if one panics, only the already-constructed prefix
        // (left, untouched) plus the already-constructed right elements
        // need destructing, and Rust's own unwind-drop of `desc`'s caller
        // (the facade) handles that at a higher level once this function
        // returns an error — here we simply avoid double-running
        // construction on `left`.
        let right_dst = unsafe { dst.add(left_len * desc.size) };
        // Safety: right_dst..+right_len*size is uninitialized and within
        // the (possibly grown in place) work array; right_ptr doesn't
        // alias dst.
        unsafe {
            (desc.copy_construct)(right_dst, right_ptr, right_ptr.add(right_len * desc.size));
        }
    } else {
        // Safety: dst is a fresh (or at least disjoint-from-source) array
        // of total_len elements; left_ptr/right_ptr are each live ranges of
        // their stated lengths, disjoint from dst.
        unsafe {
            (desc.copy_construct)(dst, left_ptr, left_ptr.add(left_len * desc.size));
            let right_dst = dst.add(left_len * desc.size);
            (desc.copy_construct)(right_dst, right_ptr, right_ptr.add(right_len * desc.size));
        }
        if replacing && !left_ptr.is_null() && left_ptr == state.begin as *const u8 {
            // The old array is being replaced and we just copy-constructed
            // its elements into the new one: destruct the old elements now
            // that dst holds independent copies.
            unsafe {
                destruct_range(desc, state.begin, state.end);
            }
        }
    }
    txn.commit();
}

/// Moves `src`'s elements into `state` (spec.md's
/// `assign_move_desc_or_move_items`): when `src` is dynamically allocated
/// or externally owned, the array itself is adopted (no element moves at
/// all — the cheapest case); otherwise (an embedded array) each element is
/// move-constructed into a freshly allocated array and the source elements
/// are destructed.
pub(crate) fn assign_move(
    state: &mut VextrState,
    embedded: Option<EmbeddedSlot>,
    desc: &TypeDescriptor,
    src: &mut VextrState,
) {
    if src.is_dynamic() || !src.is_prefixed() {
        if !std::ptr::eq(state as *const _, src as *const _) {
            unsafe {
                destruct_range(desc, state.begin, state.end);
            }
            state.release();
            state.assign_shallow(src);
            src.set_dynamic(false);
            *src = VextrState::empty();
        }
        return;
    }

    let len_bytes = src.size_bytes();
    let old_state_begin = state.begin;
    let old_state_end = state.end;
    let txn = VextrTransaction::for_resize(state, false, len_bytes, embedded);
    let dst = txn.work_ptr();
    // Destruct whatever `state` held before overwriting it. When the work
    // array reuses state's own storage in place, this must happen *before*
    // move_construct below, since that call overwrites the same bytes; when
    // replacing with different storage, the order doesn't matter (the two
    // ranges don't alias) so doing it uniformly first keeps one code path.
    unsafe {
        destruct_range(desc, old_state_begin, old_state_end);
    }
    // Safety: dst is writable for `count` elements; src.begin..src.end is
    // `count` live elements, not yet destructed (it is their destination).
    unsafe {
        (desc.move_construct)(dst, src.begin, src.end);
    }
    txn.commit();
    *src = VextrState::empty();
}

/// Three-case in-place shift used by [`insert`]/[`remove`] when the work
/// array reuses the current storage: spec.md §4.4's `overlapping_move`.
/// Moves `count` elements from `src` to `dst` via `desc`'s move-construct
/// followed by destructing the vacated source slots, choosing a forward or
/// backward per-element walk so that an overlapping shift never
/// reads-after-overwrite.
///
/// # Safety
/// `src`/`dst` must each be valid for `count` contiguous elements of
/// `desc.size` bytes; the `count` elements at `src` must be live.
unsafe fn overlapping_move(desc: &TypeDescriptor, dst: *mut u8, src: *mut u8, count: usize) {
    if count == 0 || dst == src {
        return;
    }
    let size = desc.size;
    if dst < src {
        let gap = (src as usize - dst as usize) / size;
        if gap >= count {
            // Fully disjoint: one bulk move suffices.
            (desc.move_construct)(dst, src, src.add(count * size));
            return;
        }
        // dst < src, overlapping: move forward one element at a time so
        // each destination slot is consumed (by the move) before it is
        // later read as a source slot for the next position.
        for i in 0..count {
            let s = src.add(i * size);
            let d = dst.add(i * size);
            (desc.move_construct)(d, s, s.add(size));
            (desc.destruct)(s, s.add(size));
        }
    } else {
        let gap = (dst as usize - src as usize) / size;
        if gap >= count {
            (desc.move_construct)(dst, src, src.add(count * size));
            return;
        }
        // dst > src, overlapping: move backward so the same read-before-
        // overwrite property holds in the other direction.
        for i in (0..count).rev() {
            let s = src.add(i * size);
            let d = dst.add(i * size);
            (desc.move_construct)(d, s, s.add(size));
            (desc.destruct)(s, s.add(size));
        }
    }
}

/// Inserts `count` elements (copy-constructed from `items`) at element
/// index `at` (spec.md's complex `insert`).
pub(crate) fn insert(
    state: &mut VextrState,
    embedded: Option<EmbeddedSlot>,
    desc: &TypeDescriptor,
    at: usize,
    items: *const u8,
    count: usize,
) {
    let old_count = state.size_bytes() / desc.size;
    debug_assert!(at <= old_count);
    let new_len_bytes = (old_count + count) * desc.size;
    let txn = VextrTransaction::for_resize(state, false, new_len_bytes, embedded);
    let dst = txn.work_ptr();
    let replacing = txn.will_replace_array();

    unsafe {
        if replacing {
            if at > 0 {
                (desc.move_construct)(dst, state.begin, state.begin.add(at * desc.size));
            }
            (desc.copy_construct)(
                dst.add(at * desc.size),
                items,
                items.add(count * desc.size),
            );
            if old_count > at {
                (desc.move_construct)(
                    dst.add((at + count) * desc.size),
                    state.begin.add(at * desc.size),
                    state.end,
                );
            }
            // Every old-location element (prefix and tail alike) was
            // relocated via move_construct above, not copied: there is
            // nothing live left at the old array to destruct.
        } else {
            // In-place: `copy_construct` runs the element's `Clone` impl and
            // may panic. Construct the inserted elements into a disjoint
            // scratch buffer first, so a panic there leaves the live array
            // completely untouched (the tail hasn't been shifted yet and
            // `dst`'s gap hasn't been written to). Only once the scratch
            // holds real, live elements do we shift the tail out of the way
            // (a pure move-construct + destruct of the source, never user
            // code, so it can't panic) and move the scratch's elements into
            // the gap it left behind.
            let scratch = InsertScratch::new(count, desc.size);
            if count > 0 {
                (desc.copy_construct)(scratch.ptr, items, items.add(count * desc.size));
            }
            if old_count > at {
                overlapping_move(
                    desc,
                    dst.add((at + count) * desc.size),
                    dst.add(at * desc.size),
                    old_count - at,
                );
            }
            if count > 0 {
                (desc.move_construct)(
                    dst.add(at * desc.size),
                    scratch.ptr,
                    scratch.ptr.add(count * desc.size),
                );
            }
        }
    }
    txn.commit();
}

/// Scratch buffer used by the in-place branch of [`insert`] to hold the
/// newly copy-constructed elements until the tail has been shifted out of
/// their way, rather than constructing directly into the gap.
struct InsertScratch {
    ptr: *mut u8,
    layout: Option<Layout>,
}

impl InsertScratch {
    fn new(count: usize, elem_size: usize) -> Self {
        if count == 0 {
            return InsertScratch {
                ptr: ptr::null_mut(),
                layout: None,
            };
        }
        // MAX_ALIGN, not an alignment derived from T: the vtable erases T
        // down to a size in bytes, same as every other allocation this
        // crate's complex ops make (see vextr/state.rs's own rationale).
        let layout = memory::layout_for(count * elem_size, MAX_ALIGN);
        let ptr = memory::alloc_bytes(layout).as_ptr();
        InsertScratch { ptr, layout: Some(layout) }
    }
}

impl Drop for InsertScratch {
    fn drop(&mut self) {
        if let Some(layout) = self.layout {
            // Never destructs: by the time this drops, whatever the scratch
            // held has either been move-constructed out already (ownership
            // transferred, nothing left to destruct) or a panic during
            // `copy_construct` left it holding no live elements in the
            // first place.
            unsafe {
                memory::dealloc_bytes(NonNull::new_unchecked(self.ptr), layout);
            }
        }
    }
}

/// Removes `count` elements starting at element index `at` (spec.md's
/// complex `remove`).
///
/// When `out` is `Some`, the removed elements are move-constructed there
/// (ownership transfers to the caller) instead of being destructed in
/// place — used by callers like `VecBuf::remove_at` that hand the removed
/// value back rather than dropping it.
pub(crate) fn remove(
    state: &mut VextrState,
    embedded: Option<EmbeddedSlot>,
    desc: &TypeDescriptor,
    at: usize,
    count: usize,
    out: Option<*mut u8>,
) {
    let old_count = state.size_bytes() / desc.size;
    debug_assert!(at + count <= old_count);
    let new_count = old_count - count;
    let new_len_bytes = new_count * desc.size;

    // Removal never needs a fresh array larger than the current capacity,
    // but a shrink may still choose to reallocate; reuse in place whenever
    // possible by driving the resize through the transaction the same way
    // insert does, so both paths share the backup/no-backup logic.
    let txn = VextrTransaction::for_resize(state, false, new_len_bytes, embedded);
    let dst = txn.work_ptr();
    let replacing = txn.will_replace_array();
    let tail_start = at + count;
    let tail_elems = old_count - tail_start;

    unsafe {
        if replacing {
            if at > 0 {
                (desc.move_construct)(dst, state.begin, state.begin.add(at * desc.size));
            }
            if tail_elems > 0 {
                (desc.move_construct)(
                    dst.add(at * desc.size),
                    state.begin.add(tail_start * desc.size),
                    state.end,
                );
            }
            let removed_begin = state.begin.add(at * desc.size);
            let removed_end = state.begin.add(tail_start * desc.size);
            match out {
                Some(out) => (desc.move_construct)(out, removed_begin, removed_end),
                None => destruct_range(desc, removed_begin, removed_end),
            }
            // The moved-from prefix/tail elements were relocated via
            // move_construct above (which leaves the bytes at their old
            // location logically dead, not double-owned); only the
            // removed span itself still held live elements, handled above.
        } else {
            let removed_begin = dst.add(at * desc.size);
            let removed_end = dst.add(tail_start * desc.size);
            match out {
                Some(out) => (desc.move_construct)(out, removed_begin, removed_end),
                None => destruct_range(desc, removed_begin, removed_end),
            }
            if tail_elems > 0 {
                overlapping_move(desc, removed_begin, removed_end, tail_elems);
            }
        }
    }
    txn.commit();
}

/// Grows or shrinks capacity, relocating live elements via move-construct
/// (spec.md's complex `set_capacity`).
pub(crate) fn set_capacity(
    state: &mut VextrState,
    embedded: Option<EmbeddedSlot>,
    desc: &TypeDescriptor,
    new_capacity_elems: usize,
) {
    let new_capacity_bytes = new_capacity_elems * desc.size;
    if new_capacity_bytes <= state.capacity_bytes() && state.is_prefixed() {
        return;
    }
    let old_count = state.size_bytes() / desc.size;
    let txn = VextrTransaction::for_resize(state, false, new_capacity_bytes, embedded);
    let dst = txn.work_ptr();
    if old_count > 0 {
        // Safety: dst has room for at least old_count elements (capacity
        // only ever grows relative to current size here); state's elements
        // are live and about to be relocated.
        unsafe {
            (desc.move_construct)(dst, state.begin, state.end);
        }
    }
    let kept_bytes = old_count * desc.size;
    txn.commit();
    state.end = unsafe { state.begin.add(kept_bytes) };
}

/// Changes the logical element count to `new_count`, default-constructing
/// (via copy-constructing a caller-supplied `fill` element) any newly
/// exposed slots and destructing any trailing ones that shrink away
/// (spec.md's complex `set_size`).
pub(crate) fn set_size(
    state: &mut VextrState,
    embedded: Option<EmbeddedSlot>,
    desc: &TypeDescriptor,
    new_count: usize,
    fill: *const u8,
) {
    let old_count = state.size_bytes() / desc.size;
    if new_count < old_count {
        let new_len_bytes = new_count * desc.size;
        if state.is_prefixed() {
            unsafe {
                destruct_range(
                    desc,
                    state.begin.add(new_len_bytes),
                    state.end,
                );
            }
            state.end = unsafe { state.begin.add(new_len_bytes) };
            return;
        }
    }
    if new_count == old_count {
        return;
    }

    let new_len_bytes = new_count * desc.size;
    let keep_count = old_count.min(new_count);
    let txn = VextrTransaction::for_resize(state, false, new_len_bytes, embedded);
    let dst = txn.work_ptr();
    unsafe {
        if keep_count > 0 {
            let keep_end = state.begin.add(keep_count * desc.size);
            (desc.move_construct)(dst, state.begin, keep_end);
            if keep_count < old_count {
                // Downsizing via a fresh array (only reachable when the
                // current array is non-prefixed, i.e. held no elements):
                // nothing live remains past keep_end to destruct.
                debug_assert_eq!(old_count, 0);
            }
        }
        for i in old_count.max(keep_count)..new_count {
            let slot = dst.add(i * desc.size);
            (desc.copy_construct)(slot, fill, fill.add(desc.size));
        }
    }
    txn.commit();
}
