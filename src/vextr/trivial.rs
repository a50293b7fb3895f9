//! Trivial (byte-copyable) element operations: spec.md §4.3. Every move
//! degrades to a byte copy (`ptr::copy`/`ptr::copy_nonoverlapping`, the
//! analogues of `memmove`/`memcpy`) since a `Copy` element has no drop glue
//! and no internal self-reference that a raw byte move could invalidate.

use std::ptr;

use super::state::VextrState;
use super::transaction::{EmbeddedSlot, VextrTransaction};

/// Overwrites `state`'s contents with a copy of `src` (spec.md's
/// `assign_copy`). `elem_size` is the element stride in bytes; `src`'s
/// length must already be a multiple of it.
pub(crate) fn assign_copy(state: &mut VextrState, embedded: Option<EmbeddedSlot>, src: &[u8]) {
    let txn = VextrTransaction::for_resize(state, true, src.len(), embedded);
    // Safety: work_ptr() is writable for at least src.len() bytes and
    // doesn't overlap src (src belongs to a distinct allocation/slice).
    unsafe {
        ptr::copy_nonoverlapping(src.as_ptr(), txn.work_ptr(), src.len());
    }
    txn.commit();
}

/// Overwrites `state` with the concatenation of `left` and `right` (spec.md
/// §4.3/§4.4's `assign_concat`, trivial specialization). Used both for a
/// plain append (`left` aliasing `state`'s current bytes, `right` new) and
/// for building a fresh value out of two unrelated ranges.
pub(crate) fn assign_concat(
    state: &mut VextrState,
    embedded: Option<EmbeddedSlot>,
    left: &[u8],
    right: &[u8],
) {
    let total = left.len() + right.len();
    let txn = VextrTransaction::for_resize(state, true, total, embedded);
    let dst = txn.work_ptr();
    // Safety: dst is writable for `total` bytes; left/right may alias
    // state's *current* array when reusing it in place, so copy (not
    // copy_nonoverlapping) for the first range in that case.
    unsafe {
        if txn.will_replace_array() {
            ptr::copy_nonoverlapping(left.as_ptr(), dst, left.len());
        } else {
            ptr::copy(left.as_ptr(), dst, left.len());
        }
        ptr::copy_nonoverlapping(right.as_ptr(), dst.add(left.len()), right.len());
    }
    txn.commit();
}

/// Moves `src`'s contents into `state`, degrading to a byte copy plus
/// clearing `src` (spec.md's `assign_move_desc_or_move_items`, trivial
/// specialization: there is no descriptor to move through, so "moving" an
/// element is indistinguishable from copying its bytes).
pub(crate) fn assign_move(state: &mut VextrState, src: &mut VextrState) {
    state.release();
    state.assign_shallow(src);
    // src no longer owns whatever dynamic array it pointed at; state does.
    src.set_dynamic(false);
    *src = VextrState::empty();
}

/// Shares `src`'s external read-only bytes directly (no copy) when `src` is
/// a non-owning view, or deep-copies its bytes otherwise (spec.md's
/// `assign_share_raw_or_copy_desc`).
pub(crate) fn assign_share_or_copy(
    state: &mut VextrState,
    embedded: Option<EmbeddedSlot>,
    src: &VextrState,
) {
    if !src.is_dynamic() && !src.is_prefixed() {
        state.release();
        state.assign_shallow(src);
        return;
    }
    let size = src.size_bytes();
    // Safety: src.begin..src.end is `size` live bytes.
    let bytes = unsafe { std::slice::from_raw_parts(src.begin, size) };
    assign_copy(state, embedded, bytes);
}

/// Inserts `insert` at byte offset `at` and/or removes `remove_len` bytes
/// starting at `at`, in one resize (spec.md's `insert_remove`).
pub(crate) fn insert_remove(
    state: &mut VextrState,
    embedded: Option<EmbeddedSlot>,
    at: usize,
    remove_len: usize,
    insert: &[u8],
) {
    debug_assert!(at + remove_len <= state.size_bytes());
    let old_size = state.size_bytes();
    let tail_start = at + remove_len;
    let tail_len = old_size - tail_start;

    let txn =
        VextrTransaction::for_insert_remove(state, true, insert.len(), remove_len, embedded);
    let dst = txn.work_ptr();
    let replacing = txn.will_replace_array();

    // Safety: dst has room for old_size - remove_len + insert.len() bytes;
    // the source state (if reused in place) may overlap dst, so use
    // ptr::copy (memmove semantics) whenever we are not moving to a fresh
    // block.
    unsafe {
        if replacing {
            if at > 0 {
                ptr::copy_nonoverlapping(state.begin, dst, at);
            }
            if !insert.is_empty() {
                ptr::copy_nonoverlapping(insert.as_ptr(), dst.add(at), insert.len());
            }
            if tail_len > 0 {
                ptr::copy_nonoverlapping(state.begin.add(tail_start), dst.add(at + insert.len()), tail_len);
            }
        } else {
            // In-place: shift the tail first (it may overlap both the
            // removed region and the freshly inserted region), then write
            // the inserted bytes.
            if tail_len > 0 {
                ptr::copy(dst.add(tail_start), dst.add(at + insert.len()), tail_len);
            }
            if !insert.is_empty() {
                ptr::copy(insert.as_ptr(), dst.add(at), insert.len());
            }
        }
    }
    txn.commit();
}

/// Grows or shrinks the backing capacity without changing the logical
/// content beyond `min(old_size, new_size)` bytes (spec.md's `set_capacity`).
pub(crate) fn set_capacity(
    state: &mut VextrState,
    embedded: Option<EmbeddedSlot>,
    new_capacity: usize,
) {
    if new_capacity <= state.capacity_bytes() && state.is_prefixed() {
        return;
    }
    let old_size = state.size_bytes();
    let keep = old_size.min(new_capacity);
    let txn = VextrTransaction::for_resize(state, true, new_capacity, embedded);
    // Safety: work array has room for new_capacity >= keep bytes; state's
    // old array (if any) has keep live bytes starting at state.begin.
    unsafe {
        if keep > 0 {
            ptr::copy(state.begin, txn.work_ptr(), keep);
        }
    }
    let work_size = keep;
    txn.commit();
    // commit() set state.end to begin + new_capacity (the resize target);
    // set_capacity's contract is that *size* tracks the kept content, not
    // the new capacity, so fix it up.
    state.end = unsafe { state.begin.add(work_size) };
}

/// Changes the logical size to `new_size`, zero-filling any newly exposed
/// bytes (spec.md's `set_size`).
pub(crate) fn set_size(state: &mut VextrState, embedded: Option<EmbeddedSlot>, new_size: usize) {
    let old_size = state.size_bytes();
    if new_size <= state.capacity_bytes() && state.is_prefixed() {
        if new_size > old_size {
            // Safety: new_size <= capacity_bytes(), so this range is within
            // the current allocation.
            unsafe {
                ptr::write_bytes(state.begin.add(old_size), 0, new_size - old_size);
            }
        }
        state.end = unsafe { state.begin.add(new_size) };
        return;
    }
    let txn = VextrTransaction::for_resize(state, true, new_size, embedded);
    // Safety: work array has new_size bytes; old_size of them are copied
    // from the current array, the rest zero-filled.
    unsafe {
        if old_size > 0 {
            ptr::copy_nonoverlapping(state.begin, txn.work_ptr(), old_size.min(new_size));
        }
        if new_size > old_size {
            ptr::write_bytes(txn.work_ptr().add(old_size), 0, new_size - old_size);
        }
    }
    txn.commit();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_copy_then_concat_grows_in_place_or_reallocates() {
        let mut s = VextrState::empty();
        assign_copy(&mut s, None, b"hello");
        assert_eq!(s.size_bytes(), 5);
        let snapshot: Vec<u8> =
            unsafe { std::slice::from_raw_parts(s.begin, s.size_bytes()) }.to_vec();
        assert_eq!(snapshot, b"hello");

        let left = snapshot.clone();
        assign_concat(&mut s, None, &left, b" world");
        let out = unsafe { std::slice::from_raw_parts(s.begin, s.size_bytes()) };
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn insert_remove_splices_bytes() {
        let mut s = VextrState::empty();
        assign_copy(&mut s, None, b"helloworld");
        insert_remove(&mut s, None, 5, 0, b", ");
        let out = unsafe { std::slice::from_raw_parts(s.begin, s.size_bytes()) }.to_vec();
        assert_eq!(out, b"hello, world");

        insert_remove(&mut s, None, 5, 2, b"");
        let out = unsafe { std::slice::from_raw_parts(s.begin, s.size_bytes()) }.to_vec();
        assert_eq!(out, b"helloworld");
    }

    #[test]
    fn set_size_zero_fills_growth() {
        let mut s = VextrState::empty();
        assign_copy(&mut s, None, b"ab");
        set_size(&mut s, None, 5);
        let out = unsafe { std::slice::from_raw_parts(s.begin, s.size_bytes()) };
        assert_eq!(out, &[b'a', b'b', 0, 0, 0]);
    }

    #[test]
    fn set_capacity_preserves_content() {
        let mut s = VextrState::empty();
        assign_copy(&mut s, None, b"abcd");
        set_capacity(&mut s, None, 256);
        assert!(s.capacity_bytes() >= 256);
        assert_eq!(s.size_bytes(), 4);
        let out = unsafe { std::slice::from_raw_parts(s.begin, s.size_bytes()) };
        assert_eq!(out, b"abcd");
    }
}
