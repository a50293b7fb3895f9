//! The allocator boundary: `alloc`/`realloc`/`free` on raw byte buffers.
//!
//! Every dynamic allocation in the crate — vextr's heap-prefixed arrays and
//! the hopscotch map's bucket arrays alike — goes through here, the same way
//! `index/hash/table.rs`'s `RawTable` talks to `std::alloc` directly through
//! a hand-computed `Layout` instead of going through `Vec`. Centralizing it
//! means there is exactly one place that decides what happens on OOM.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// Allocates `layout` and aborts the process if the allocator returns null.
///
/// The core has no fallible-allocation story at the facade level (see
/// DESIGN.md), so like the teacher's `Fallibility::Infallible` path this
/// calls `handle_alloc_error`, which prints a diagnostic and aborts rather
/// than unwinding into code that cannot possibly proceed without memory.
#[inline]
pub(crate) fn alloc_bytes(layout: Layout) -> NonNull<u8> {
    if layout.size() == 0 {
        return NonNull::new(layout.align() as *mut u8).expect("nonzero alignment");
    }
    // Safety: layout.size() != 0, checked above.
    let ptr = unsafe { alloc::alloc(layout) };
    match NonNull::new(ptr) {
        Some(p) => p,
        None => alloc::handle_alloc_error(layout),
    }
}

/// Reallocates a previously-`alloc_bytes`-allocated buffer to `new_layout`.
///
/// `old_layout` must describe the buffer currently at `ptr` exactly as it
/// was allocated (or last reallocated to).
///
/// # Safety
/// `ptr` must have been obtained from `alloc_bytes`/`realloc_bytes` with
/// `old_layout`, and must not be used again if this function is called with
/// a layout of a different alignment (in which case it is freed and a fresh
/// block is allocated).
#[inline]
pub(crate) unsafe fn realloc_bytes(
    ptr: NonNull<u8>,
    old_layout: Layout,
    new_size: usize,
) -> NonNull<u8> {
    if new_size == 0 {
        dealloc_bytes(ptr, old_layout);
        return NonNull::new(old_layout.align() as *mut u8).expect("nonzero alignment");
    }
    let raw = alloc::realloc(ptr.as_ptr(), old_layout, new_size);
    match NonNull::new(raw) {
        Some(p) => p,
        None => {
            let new_layout = Layout::from_size_align_unchecked(new_size, old_layout.align());
            alloc::handle_alloc_error(new_layout)
        }
    }
}

/// Frees a buffer previously obtained from `alloc_bytes`/`realloc_bytes`.
///
/// # Safety
/// `ptr`/`layout` must match the allocation exactly (same rules as
/// `std::alloc::dealloc`); `layout.size() == 0` is a no-op since such
/// buffers were never actually allocated.
#[inline]
pub(crate) unsafe fn dealloc_bytes(ptr: NonNull<u8>, layout: Layout) {
    if layout.size() != 0 {
        alloc::dealloc(ptr.as_ptr(), layout);
    }
}

/// Computes a `Layout` for a byte buffer of `size` with `align` alignment,
/// panicking (rather than returning an error) on overflow — the same
/// trade-off the teacher's `calculate_layout` makes for hash table buckets,
/// since a layout that overflows `isize::MAX` cannot be satisfied by any
/// allocator anyway.
#[inline]
pub(crate) fn layout_for(size: usize, align: usize) -> Layout {
    Layout::from_size_align(size, align).expect("vextr buffer layout overflow")
}
