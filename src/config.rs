//! Ambient configuration, in the shape of the teacher's `config::IndexConfig`:
//! a small `Default`-able settings struct with a builder method, consumed by
//! the one component that has a genuine knob to turn.

/// Settings for a [`HopscotchMap`](crate::map::HopscotchMap).
///
/// Vextr's string/vector facades take no configuration beyond their
/// compile-time embedded capacity `N` (spec.md §4.5–§4.6), so this is the
/// only config type the crate needs.
#[derive(Clone, Copy, Debug)]
pub struct MapConfig {
    /// The neighborhood size a freshly grown table starts at, before it
    /// grows further under sustained displacement pressure. Defaults to
    /// the machine word's bit count, per spec.md §4.7's suggestion — wide
    /// enough that most insertions find room in a single lookup window.
    pub ideal_neighborhood: usize,
}

impl MapConfig {
    pub fn with_ideal_neighborhood(mut self, neighborhood: usize) -> Self {
        self.ideal_neighborhood = neighborhood;
        self
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            ideal_neighborhood: usize::BITS as usize,
        }
    }
}
