//! The string facade: spec.md §4.5. `StrBuf<N>` is always trivial-backed
//! (bytes are `Copy`) and never counts a trailing NUL in its logical
//! length. A string built from a `'static` literal starts out as a
//! non-prefixed, shareable view (`has_nul_term` tracks whether that view
//! already happens to be NUL-terminated, e.g. a C-style literal); any
//! mutation promotes it to owned, prefixed storage and clears the flag.
//!
//! `Str` (`N = 0`) is the heap-only alias, matching spec.md's
//! `text::sstr<0>` aka `text::str`.

use std::mem::{self, MaybeUninit};
use std::ops::Deref;
use std::ptr;

use crate::vextr::state::{PrefixedHeader, VextrState};
use crate::vextr::transaction::EmbeddedSlot;
use crate::vextr::trivial;

/// A string with `N` bytes of inline (embedded) capacity before it spills
/// onto the heap.
#[repr(C)]
pub struct StrBuf<const N: usize> {
    state: VextrState,
    embedded_header: PrefixedHeader,
    embedded: [MaybeUninit<u8>; N],
}

/// The heap-only string, with no embedded capacity.
pub type Str = StrBuf<0>;

impl<const N: usize> StrBuf<N> {
    pub fn new() -> Self {
        StrBuf {
            state: VextrState::empty(),
            embedded_header: PrefixedHeader { capacity: N },
            embedded: [MaybeUninit::uninit(); N],
        }
    }

    /// Adopts `s` as a shareable, read-only, non-owning view: no copy is
    /// made, and no mutation through this `StrBuf` is possible until it is
    /// promoted to owned storage by any mutating method.
    pub fn from_static(s: &'static str) -> Self {
        let begin = s.as_ptr() as *mut u8;
        // Safety: begin..begin+len() stays valid for 'static.
        let end = unsafe { begin.add(s.len()) };
        StrBuf {
            state: VextrState::external(begin, end, false),
            embedded_header: PrefixedHeader { capacity: N },
            embedded: [MaybeUninit::uninit(); N],
        }
    }

    /// Adopts `bytes` (which must end in exactly one trailing NUL not
    /// counted in the logical length) as a shareable, NUL-terminated view —
    /// the literal-sharing case spec.md calls out: [`c_str`](Self::c_str)
    /// on a `StrBuf` built this way never allocates.
    pub fn from_nul_terminated_static(bytes: &'static [u8]) -> Self {
        debug_assert!(bytes.last() == Some(&0), "must end in a NUL byte");
        let begin = bytes.as_ptr() as *mut u8;
        // Safety: begin..begin+len()-1 stays valid for 'static.
        let end = unsafe { begin.add(bytes.len() - 1) };
        StrBuf {
            state: VextrState::external(begin, end, true),
            embedded_header: PrefixedHeader { capacity: N },
            embedded: [MaybeUninit::uninit(); N],
        }
    }

    fn embedded_slot(&mut self) -> Option<EmbeddedSlot> {
        if N == 0 {
            return None;
        }
        Some(EmbeddedSlot {
            data: self.embedded.as_mut_ptr().cast::<u8>(),
            byte_capacity: N,
        })
    }

    /// The embedded buffer's address as of *this* call. Moving `self` is a
    /// memcpy, so this must be recomputed every time rather than trusted
    /// from a value cached before some earlier move — see
    /// [`sync_embedded`](Self::sync_embedded).
    fn effective_begin(&self) -> *mut u8 {
        if self.state.is_embedded_active() {
            self.embedded.as_ptr() as *mut u8
        } else {
            self.state.begin
        }
    }

    /// Re-anchors `state.begin`/`state.end` to this instance's current
    /// embedded buffer address before any operation that reads through them
    /// directly (as opposed to `effective_begin`, which is safe to call from
    /// `&self`). Without this, a `StrBuf` built (and put into embedded mode)
    /// as a local and then moved out by value — `from_bytes`/`substr`/
    /// `Clone` all do this — would carry a `begin` pointing at the dead,
    /// pre-move location.
    fn sync_embedded(&mut self) {
        let data = self.embedded.as_mut_ptr().cast::<u8>();
        self.state.rebase_embedded(data);
    }

    pub fn len(&self) -> usize {
        self.state.size_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        if self.state.is_embedded_active() {
            N
        } else {
            self.state.capacity_bytes()
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        if self.state.begin.is_null() {
            return &[];
        }
        // Safety: effective_begin()..+len() is `len()` initialized, live
        // bytes, wherever the embedded buffer currently lives.
        unsafe { std::slice::from_raw_parts(self.effective_begin(), self.len()) }
    }

    pub fn as_str(&self) -> &str {
        let bytes = self.as_bytes();
        debug_assert!(std::str::from_utf8(bytes).is_ok());
        // Safety: every constructor/mutator only ever writes valid UTF-8
        // (a `&str`'s bytes, or a concatenation of two such byte ranges).
        unsafe { std::str::from_utf8_unchecked(bytes) }
    }

    pub fn push_str(&mut self, s: &str) {
        self.sync_embedded();
        let embedded = self.embedded_slot();
        let left = self.as_bytes().to_vec();
        trivial::assign_concat(&mut self.state, embedded, &left, s.as_bytes());
    }

    pub fn clear(&mut self) {
        self.sync_embedded();
        self.state.end = self.state.begin;
    }

    /// A `*const u8` to a NUL-terminated view of this string's bytes.
    /// Returns the interior pointer directly when the string is already a
    /// NUL-terminated shareable view; otherwise grows capacity by one byte
    /// if needed, writes the terminator just past the logical end (without
    /// counting it in `len()`), and remembers that it's there.
    pub fn c_str(&mut self) -> *const u8 {
        self.sync_embedded();
        if self.state.has_nul_term() {
            return self.state.begin;
        }
        let size = self.len();
        if size + 1 > self.capacity() || !self.state.is_prefixed() {
            let embedded = self.embedded_slot();
            trivial::set_capacity(&mut self.state, embedded, size + 1);
        }
        // Safety: capacity is now at least size + 1.
        unsafe {
            ptr::write(self.state.begin.add(size), 0u8);
        }
        self.state.set_has_nul_term(true);
        self.state.begin
    }

    /// Python-style substring: negative indices count from the end; both
    /// bounds are clamped independently into `[0, len]` and then `a` is
    /// clamped to not exceed `b`, producing an empty result rather than a
    /// panic for any out-of-order or out-of-range input.
    pub fn substr(&self, a: isize, b: isize) -> Self {
        let len = self.len();
        let mut lo = normalize_index(a, len);
        let hi = normalize_index(b, len);
        if lo > hi {
            lo = hi;
        }
        Self::from_bytes(&self.as_bytes()[lo..hi])
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        let mut out = Self::new();
        let embedded = out.embedded_slot();
        trivial::assign_copy(&mut out.state, embedded, bytes);
        out
    }

    /// Byte offset of the first occurrence of `c`, or `None` (spec.md's
    /// `find(char)`). Byte-level, not codepoint-level: safe because every
    /// constructor here only ever stores valid UTF-8 and ASCII bytes are
    /// self-synchronizing against multi-byte sequences.
    pub fn find(&self, c: char) -> Option<usize> {
        self.as_str().find(c)
    }

    /// Byte offset of the first occurrence of `sub`, or `None` (spec.md's
    /// `find(str)`).
    pub fn find_str(&self, sub: &str) -> Option<usize> {
        self.as_str().find(sub)
    }

    /// Byte offset of the last occurrence of `c`, or `None` (spec.md's
    /// `find_last(char)`).
    pub fn find_last(&self, c: char) -> Option<usize> {
        self.as_str().rfind(c)
    }

    pub fn starts_with(&self, sub: &str) -> bool {
        self.as_str().starts_with(sub)
    }

    pub fn ends_with(&self, sub: &str) -> bool {
        self.as_str().ends_with(sub)
    }

    /// Replaces every non-overlapping occurrence of `old` with `new`
    /// (spec.md's `replace`): same-length replacements mutate in place
    /// without touching capacity; any size change drives growth through the
    /// ordinary `insert_remove` transaction, one match at a time, so a
    /// relocation mid-scan never leaves a stale offset behind.
    pub fn replace(&mut self, old: &str, new: &str) {
        if old.is_empty() {
            return;
        }
        self.sync_embedded();
        let mut search_from = 0;
        loop {
            let hay = self.as_bytes();
            let Some(found) = find_bytes(&hay[search_from..], old.as_bytes()) else {
                break;
            };
            let at = search_from + found;
            let embedded = self.embedded_slot();
            trivial::insert_remove(&mut self.state, embedded, at, old.len(), new.as_bytes());
            search_from = at + new.len();
        }
    }
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn normalize_index(idx: isize, len: usize) -> usize {
    let len_i = len as isize;
    let i = if idx < 0 { idx + len_i } else { idx };
    i.clamp(0, len_i) as usize
}

impl<const N: usize> Default for StrBuf<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Clone for StrBuf<N> {
    fn clone(&self) -> Self {
        if !self.state.is_dynamic() && !self.state.is_prefixed() {
            // Non-owning view: share it directly, same as the original.
            let mut out = Self::new();
            out.state = VextrState::external(self.state.begin, self.state.end, self.state.has_nul_term());
            return out;
        }
        Self::from_bytes(self.as_bytes())
    }
}

impl<const N: usize> std::fmt::Debug for StrBuf<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self.as_str(), f)
    }
}

impl<const N: usize> std::fmt::Display for StrBuf<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self.as_str(), f)
    }
}

impl<const N: usize> Deref for StrBuf<N> {
    type Target = str;
    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl<const N: usize> PartialEq for StrBuf<N> {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl<const N: usize> Eq for StrBuf<N> {}

impl<const N: usize> PartialEq<str> for StrBuf<N> {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl<const N: usize> std::ops::Add<&str> for StrBuf<N> {
    type Output = StrBuf<N>;
    fn add(mut self, rhs: &str) -> StrBuf<N> {
        self.push_str(rhs);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_literal_is_shared_until_mutated() {
        let s = Str::from_static("hello");
        assert_eq!(s.as_str(), "hello");
        assert!(!s.state.is_dynamic());
        assert!(!s.state.is_prefixed());
    }

    #[test]
    fn push_str_promotes_to_owned_storage() {
        let mut s = Str::from_static("hello");
        s.push_str(" world");
        assert_eq!(s.as_str(), "hello world");
        assert!(s.state.is_prefixed());
    }

    #[test]
    fn c_str_on_plain_view_allocates_and_terminates() {
        let mut s = Str::from_static("abc");
        let ptr = s.c_str();
        assert!(s.state.has_nul_term());
        unsafe {
            assert_eq!(*ptr.add(3), 0);
        }
    }

    #[test]
    fn c_str_on_nul_terminated_literal_is_free() {
        let mut s = Str::from_nul_terminated_static(b"abc\0");
        assert_eq!(s.len(), 3);
        let ptr = s.c_str();
        assert_eq!(ptr, s.state.begin);
    }

    #[test]
    fn substr_handles_negative_and_out_of_order_indices() {
        let s = Str::from_static("hello world");
        assert_eq!(s.substr(0, 5).as_str(), "hello");
        assert_eq!(s.substr(-5, -1).as_str(), "worl");
        assert_eq!(s.substr(8, 2).as_str(), "");
        assert_eq!(s.substr(-100, 100).as_str(), "hello world");
    }

    #[test]
    fn embedded_small_string_stays_inline() {
        let mut s: StrBuf<16> = StrBuf::new();
        s.push_str("short");
        assert!(!s.state.is_dynamic());
        assert_eq!(s.as_str(), "short");
    }

    #[test]
    fn find_and_search_helpers() {
        let s = Str::from_static("hello world hello");
        assert_eq!(s.find('o'), Some(4));
        assert_eq!(s.find_str("world"), Some(6));
        assert_eq!(s.find_last('o'), Some(16));
        assert!(s.starts_with("hello"));
        assert!(s.ends_with("hello"));
        assert!(!s.ends_with("world"));
        assert_eq!(s.find_str("nope"), None);
    }

    #[test]
    fn replace_same_length_mutates_without_growth() {
        let mut s = Str::from_static("foo bar foo");
        s.replace("foo", "baz");
        assert_eq!(s.as_str(), "baz bar baz");
    }

    #[test]
    fn replace_shrinking_and_growing_relocates_correctly() {
        let mut s = Str::from_static("a-b-c-b-d");
        s.replace("b", "XY");
        assert_eq!(s.as_str(), "a-XY-c-XY-d");

        let mut s2 = Str::from_static("aaXYaa");
        s2.replace("XY", "");
        assert_eq!(s2.as_str(), "aaaa");
    }
}
