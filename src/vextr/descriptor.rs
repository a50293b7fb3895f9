//! The type-erased element vtable for "complex" vextr operations: spec.md
//! §3.2/§9's `TypeDescriptor`, built generically so callers never write the
//! unsafe function pointers by hand.
//!
//! Kept deliberately as raw function pointers over a byte range, rather
//! than a boxed trait object, so the complex op implementations in
//! `complex.rs` stay exactly as type-erased (and therefore compiled once,
//! not monomorphized per `T`) as spec.md's architecture intends.

use std::mem;
use std::ptr;

/// A vtable of raw element operations over `*mut u8`/`*const u8` ranges.
/// `size` is the element stride; every range passed to the function
/// pointers below is always a whole number of `size`-byte elements.
///
/// Deliberately omits `equals`/`hash` entries despite spec.md §3.2/§9's
/// listed field set (see DESIGN.md): every operation that needs either one
/// (`VecBuf::find`, `HopscotchMap`'s key lookups) already carries its own
/// `T: PartialEq` / `K: Eq + Hash` bound at the call site, where the
/// compiler can monomorphize straight to `T::eq`/`H::hash` — adding vtable
/// entries nothing calls would just be dead code.
#[derive(Clone, Copy)]
pub(crate) struct TypeDescriptor {
    pub(crate) size: usize,
    pub(crate) copy_construct: unsafe fn(dst: *mut u8, src_begin: *const u8, src_end: *const u8),
    pub(crate) move_construct: unsafe fn(dst: *mut u8, src_begin: *mut u8, src_end: *mut u8),
    pub(crate) destruct: unsafe fn(begin: *mut u8, end: *mut u8),
}

impl TypeDescriptor {
    /// Builds the vtable for `T`, generically — the one place in the crate
    /// where the element type is visible to the compiler before it is
    /// erased behind raw byte ranges. `T: Clone` is required because
    /// `assign_concat`'s backup-array rollback path (spec.md §4.4) needs to
    /// be able to copy-construct elements even when it is not consuming the
    /// source.
    pub(crate) fn of<T: Clone>() -> Self {
        TypeDescriptor {
            size: mem::size_of::<T>(),
            copy_construct: copy_construct::<T>,
            move_construct: move_construct::<T>,
            destruct: destruct::<T>,
        }
    }
}

unsafe fn copy_construct<T: Clone>(dst: *mut u8, src_begin: *const u8, src_end: *const u8) {
    let count = (src_end as usize - src_begin as usize) / mem::size_of::<T>();
    let src: *const T = src_begin.cast();
    let dst: *mut T = dst.cast();
    for i in 0..count {
        let value = (*src.add(i)).clone();
        ptr::write(dst.add(i), value);
    }
}

unsafe fn move_construct<T>(dst: *mut u8, src_begin: *mut u8, src_end: *mut u8) {
    let count = (src_end as usize - src_begin as usize) / mem::size_of::<T>();
    let src: *mut T = src_begin.cast();
    let dst: *mut T = dst.cast();
    ptr::copy_nonoverlapping(src, dst, count);
}

unsafe fn destruct<T>(begin: *mut u8, end: *mut u8) {
    let count = (end as usize - begin as usize) / mem::size_of::<T>();
    let begin: *mut T = begin.cast();
    for i in 0..count {
        ptr::drop_in_place(begin.add(i));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Tagged(String, u32);

    #[test]
    fn move_then_destruct_round_trips_without_double_drop() {
        let desc = TypeDescriptor::of::<Tagged>();
        let src = vec![Tagged("a".into(), 1), Tagged("b".into(), 2)];
        let mut dst: Vec<mem::MaybeUninit<Tagged>> =
            (0..src.len()).map(|_| mem::MaybeUninit::uninit()).collect();

        let mut src = mem::ManuallyDrop::new(src);
        unsafe {
            let src_begin = src.as_mut_ptr().cast::<u8>();
            let src_end = src_begin.add(src.len() * desc.size);
            (desc.move_construct)(dst.as_mut_ptr().cast(), src_begin, src_end);
        }

        let dst_begin = dst.as_mut_ptr().cast::<u8>();
        let dst_end = unsafe { dst_begin.add(dst.len() * desc.size) };
        // Safety: move_construct above initialized every element.
        unsafe {
            assert_eq!((*dst[0].as_ptr()).0, "a");
            (desc.destruct)(dst_begin, dst_end);
        }
    }

    #[test]
    fn copy_construct_clones_each_element() {
        let desc = TypeDescriptor::of::<Tagged>();
        let src = vec![Tagged("x".into(), 9)];
        let mut dst: Vec<mem::MaybeUninit<Tagged>> = vec![mem::MaybeUninit::uninit()];
        unsafe {
            let src_begin = src.as_ptr().cast::<u8>();
            let src_end = src_begin.add(src.len() * desc.size);
            (desc.copy_construct)(dst.as_mut_ptr().cast(), src_begin, src_end);
            assert_eq!((*dst[0].as_ptr()).1, 9);
            (desc.destruct)(dst.as_mut_ptr().cast(), dst.as_mut_ptr().add(1).cast());
        }
    }
}
