//! The scratch-buffer transaction: spec.md §4.2's exception(panic)-safe
//! mutation primitive.
//!
//! `VextrTransaction` builds a *candidate* successor array (`work_copy`)
//! without touching the caller's live state, then either `commit()`s it in
//! (adopting the new array and releasing the old one) or is simply dropped,
//! in which case any array it allocated along the way and never handed off
//! is freed and the caller's state is untouched. This is the same shape as
//! the teacher's guard/builder types in `index/hash/table.rs` (build a
//! value, decide at the end whether it becomes live).

use std::mem;
use std::ptr::NonNull;

use super::state::{VextrState, HEADER_SIZE, MAX_ALIGN};
use crate::memory;

/// Describes a facade's embedded storage: the data pointer (immediately
/// following the embedded header, matching the heap layout) and its total
/// byte capacity. Facades compute this fresh from `&self`/`&mut self` on
/// every call rather than caching it, since the data lives inline in the
/// facade struct and moves with it.
#[derive(Clone, Copy)]
pub(crate) struct EmbeddedSlot {
    pub(crate) data: *mut u8,
    pub(crate) byte_capacity: usize,
}

/// Builds the candidate array for a resize to `new_size` bytes, deciding
/// among the four branches spec.md §4.2 lists: stay empty, adopt the
/// embedded buffer, reuse the current prefixed array in place, or allocate.
pub(crate) struct VextrTransaction<'a> {
    target: &'a mut VextrState,
    work_copy: VextrState,
    /// True only when `work_copy` owns a freshly allocated block that no
    /// other state has a reference to yet — the only case where letting
    /// `work_copy` drop normally (uncommitted) should actually free memory.
    owns_work_array: bool,
}

impl<'a> VextrTransaction<'a> {
    /// Constructs a transaction that resizes `target`'s active array to
    /// `new_size` bytes, preserving `preserve_bytes` bytes of the existing
    /// content at the front of the new array (the caller copies/moves them
    /// in via [`work_ptr`](Self::work_ptr) before `commit`).
    ///
    /// `trivial` selects the realloc-in-place fast path (spec.md §4.2's
    /// "trivial move or copy" note): only safe when the element type has no
    /// internal pointers/addresses that a `realloc`-induced move would
    /// invalidate.
    pub(crate) fn for_resize(
        target: &'a mut VextrState,
        trivial: bool,
        new_size: usize,
        embedded: Option<EmbeddedSlot>,
    ) -> Self {
        let mut work_copy = VextrState::empty();
        let mut owns_work_array = false;

        if new_size == 0 {
            // Stays empty; nothing further to decide.
        } else {
            work_copy.set_prefixed(true);
            work_copy.set_has_nul_term(false);

            if let Some(slot) = embedded {
                if new_size <= slot.byte_capacity && target.begin != slot.data {
                    // Safety: slot.data points HEADER_SIZE bytes past a
                    // PrefixedHeader the facade initialized at construction.
                    unsafe {
                        VextrState::write_header_capacity(slot.data, slot.byte_capacity);
                    }
                    work_copy.begin = slot.data;
                    work_copy.set_dynamic(false);
                } else {
                    Self::pick_prefixed_or_allocate(
                        target,
                        trivial,
                        new_size,
                        &mut work_copy,
                        &mut owns_work_array,
                    );
                }
            } else {
                Self::pick_prefixed_or_allocate(
                    target,
                    trivial,
                    new_size,
                    &mut work_copy,
                    &mut owns_work_array,
                );
            }

            // Safety: begin was just set to a block of at least new_size bytes.
            work_copy.end = unsafe { work_copy.begin.add(new_size) };
        }

        VextrTransaction {
            target,
            work_copy,
            owns_work_array,
        }
    }

    /// Constructs a transaction for an insert/remove of `insert_size` bytes
    /// inserted and `remove_size` bytes removed from `target`'s current
    /// size — the capacity-planning half of spec.md §4.4's `insert`/`remove`.
    pub(crate) fn for_insert_remove(
        target: &'a mut VextrState,
        trivial: bool,
        insert_size: usize,
        remove_size: usize,
        embedded: Option<EmbeddedSlot>,
    ) -> Self {
        let current = target.size_bytes();
        debug_assert!(remove_size <= current);
        let new_size = current + insert_size - remove_size;
        Self::for_resize(target, trivial, new_size, embedded)
    }

    fn pick_prefixed_or_allocate(
        target: &mut VextrState,
        trivial: bool,
        new_size: usize,
        work_copy: &mut VextrState,
        owns_work_array: &mut bool,
    ) {
        if target.is_prefixed() && new_size <= target.capacity_bytes() {
            work_copy.begin = target.begin;
            work_copy.set_dynamic(target.is_dynamic());
            return;
        }

        let old_size = target.size_bytes();
        let new_capacity = VextrState::calculate_increased_capacity(old_size, new_size);
        let new_total = HEADER_SIZE + new_capacity;

        if trivial && target.is_dynamic() {
            // Safety: is_dynamic() implies a live heap block of
            // HEADER_SIZE + target.capacity_bytes() bytes at begin - HEADER_SIZE.
            unsafe {
                let old_block = NonNull::new_unchecked(target.begin.sub(HEADER_SIZE));
                let old_layout = memory::layout_for(HEADER_SIZE + target.capacity_bytes(), MAX_ALIGN);
                let new_block = memory::realloc_bytes(old_block, old_layout, new_total);
                VextrState::write_header_capacity(
                    new_block.as_ptr().add(HEADER_SIZE),
                    new_capacity,
                );
                target.begin = new_block.as_ptr().add(HEADER_SIZE);
                target.end = target.begin.add(old_size);
            }
            work_copy.begin = target.begin;
            work_copy.set_dynamic(true);
            // Ownership already reflects in `target`; work_copy is a view,
            // not an owner, so dropping it uncommitted must not free this.
            *owns_work_array = false;
        } else {
            let new_block = memory::alloc_bytes(memory::layout_for(new_total, MAX_ALIGN));
            // Safety: new_block is a fresh, writable HEADER_SIZE + new_capacity block.
            unsafe {
                VextrState::write_header_capacity(new_block.as_ptr().add(HEADER_SIZE), new_capacity);
                work_copy.begin = new_block.as_ptr().add(HEADER_SIZE);
            }
            work_copy.set_dynamic(true);
            *owns_work_array = true;
        }
    }

    /// The writable start of the candidate array. Callers fill it in (via
    /// the trivial byte-copy ops or the complex per-element ops) before
    /// calling [`commit`](Self::commit).
    pub(crate) fn work_ptr(&self) -> *mut u8 {
        self.work_copy.begin
    }

    pub(crate) fn work_size(&self) -> usize {
        self.work_copy.size_bytes()
    }

    /// True when committing this transaction will replace `target`'s
    /// current active array (as opposed to reusing it in place) — callers
    /// use this to decide whether the *old* array's contents still need
    /// destructing/copying before the swap.
    pub(crate) fn will_replace_array(&self) -> bool {
        self.work_copy.begin != self.target.begin
    }

    /// Adopts the candidate array into `target`, releasing `target`'s old
    /// array first if it's being replaced. After this, the transaction's
    /// own cleanup is skipped entirely (ownership has moved to `target`).
    pub(crate) fn commit(self) {
        let mut this = mem::ManuallyDrop::new(self);
        if this.will_replace_array() {
            this.target.release();
        }
        this.target.assign_shallow(&this.work_copy);
        // Safety: `this` is never used again and its Drop will not run
        // (ManuallyDrop), so dropping work_copy's fields directly here is
        // the only place that happens; it must not free the array we just
        // handed to `target`, so we skip running VextrState::drop on it.
        // There is nothing else owned by VextrTransaction to clean up.
    }
}

impl Drop for VextrTransaction<'_> {
    fn drop(&mut self) {
        if !self.owns_work_array {
            // Not ours to free: either empty, adopted from the embedded
            // buffer, reused target's existing array, or already folded
            // into `target` by the realloc-in-place fast path.
            self.work_copy.set_dynamic(false);
        }
        // work_copy's own Drop (VextrState::release) now runs, freeing the
        // block iff owns_work_array left its dynamic flag set.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncommitted_transaction_frees_its_fresh_allocation() {
        let mut target = VextrState::empty();
        {
            let txn = VextrTransaction::for_resize(&mut target, true, 64, None);
            assert!(txn.will_replace_array());
            // dropped without commit; Miri/ASan would catch a leak or
            // double free here, the flag bookkeeping is what prevents both.
        }
        assert_eq!(target.size_bytes(), 0);
    }

    #[test]
    fn committed_transaction_updates_target() {
        let mut target = VextrState::empty();
        let txn = VextrTransaction::for_resize(&mut target, true, 32, None);
        let ptr = txn.work_ptr();
        unsafe {
            std::ptr::write_bytes(ptr, 0xAB, 32);
        }
        txn.commit();
        assert_eq!(target.size_bytes(), 32);
        assert!(target.is_dynamic());
    }

    #[test]
    fn embedded_slot_is_adopted_without_allocating() {
        // Mirrors a facade's real layout: a PrefixedHeader immediately
        // followed by the embedded element storage, so `header_mut`'s
        // pointer-subtraction trick stays in-bounds.
        #[repr(C)]
        struct Embedded {
            header: super::super::state::PrefixedHeader,
            array: [u8; 64],
        }
        let mut embedded = Embedded {
            header: super::super::state::PrefixedHeader { capacity: 0 },
            array: [0u8; 64],
        };
        let data = embedded.array.as_mut_ptr();
        let mut target = VextrState::empty();
        let slot = EmbeddedSlot {
            data,
            byte_capacity: 64,
        };
        let txn = VextrTransaction::for_resize(&mut target, true, 16, Some(slot));
        assert_eq!(txn.work_ptr(), data);
        txn.commit();
        assert!(!target.is_dynamic());
        assert_eq!(target.size_bytes(), 16);
        assert_eq!(embedded.header.capacity, 64);
    }
}
