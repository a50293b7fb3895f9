//! String and vector facades over the vextr core: spec.md §4.5–§4.6.

pub mod iter;
pub mod string_buf;
pub mod vec_buf;

pub use iter::VecIter;
pub use string_buf::{Str, StrBuf};
pub use vec_buf::VecBuf;
