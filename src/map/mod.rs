//! The hopscotch hash map: spec.md §4.7.

pub mod hopscotch;
pub mod iter;

pub use hopscotch::HopscotchMap;
pub use iter::MapIter;
