use std::alloc::Layout;

use thiserror::Error;

/// Error kinds raised by the vextr core and the hopscotch map.
///
/// These mirror the error taxonomy the original library raises from its
/// buffer engine: everything the core can fail at collapses into one of
/// these variants, and none of them carry formatted prose — that's left to
/// whatever a caller wants to do with `Display`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VextrError {
    /// An index or iterator addressed outside `[0, size]` (or `[0, size)`
    /// when the end is not an allowed position).
    #[error("index {index} out of range for size {size}")]
    OutOfRange {
        /// The offending index.
        index: usize,
        /// The size the index was checked against.
        size: usize,
    },
    /// An operation required a non-empty container (`front`, `back`,
    /// `pop_back` on empty).
    #[error("bad access: {0}")]
    BadAccess(&'static str),
    /// The allocator could not satisfy a request for the given layout.
    #[error("allocation of {size} bytes (align {align}) failed", size = .0.size(), align = .0.align())]
    AllocationFailure(Layout),
    /// An iterator was used after a structural mutation of its container.
    #[error("iterator invalidated by a structural mutation")]
    IteratorInvalidated,
    /// A hopscotch map lookup or removal found no entry for the key.
    #[error("key not found")]
    KeyNotFound,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VextrError>;
