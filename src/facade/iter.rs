//! Index + revision iterators: spec.md's note (under `replace()`/§4.6) that
//! vector/map iterators must store `(container, index)` rather than a raw
//! pointer into the element array, so that a structural mutation in between
//! two iterator steps is detectable instead of silently reading stale or
//! relocated memory.
//!
//! Unlike a `std::slice::Iter`, this iterator does not borrow the buffer for
//! its own lifetime — it holds a raw pointer back to it, exactly as the
//! original's iterators are plain pointers with no borrow tracking. That is
//! what makes "insert while iterating" something that can happen at all
//! instead of being rejected at compile time; the revision check below is
//! what catches it instead.

use std::ptr::NonNull;

use crate::error::{Result, VextrError};
use crate::facade::vec_buf::VecBuf;

/// An iterator over a [`VecBuf`] that detects invalidation by comparing a
/// captured revision number against the buffer's current one on every step.
///
/// # Safety
/// The `VecBuf` this was built from must outlive the iterator.
pub struct VecIter<T: Clone, const N: usize> {
    buf: NonNull<VecBuf<T, N>>,
    revision: u64,
    index: usize,
    end: usize,
}

impl<T: Clone, const N: usize> VecIter<T, N> {
    pub(crate) fn new(buf: &VecBuf<T, N>) -> Self {
        VecIter {
            buf: NonNull::from(buf),
            revision: buf.revision(),
            index: 0,
            end: buf.len(),
        }
    }

    fn buf(&self) -> &VecBuf<T, N> {
        // Safety: see the struct's safety note; callers keep the source
        // buffer alive for the iterator's lifetime.
        unsafe { self.buf.as_ref() }
    }
}

impl<T: Clone, const N: usize> Iterator for VecIter<T, N> {
    type Item = Result<*const T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.end {
            return None;
        }
        if self.buf().revision() != self.revision {
            // Stop yielding after reporting the invalidation once, rather
            // than raising it on every remaining step.
            self.index = self.end;
            return Some(Err(VextrError::IteratorInvalidated));
        }
        let i = self.index;
        self.index += 1;
        Some(Ok(self.buf().get(i).expect("index within captured bounds") as *const T))
    }
}
