//! Container types with strongly-typed indexes.
use std::collections::HashMap;

/// Stores a set of `(V, I)` tuples, with lookup in both directions.
///
/// Implemented using a `Vec<V>` and a `HashMap<V, I>`.
///
/// The index type `I` should be a wrapper around a `usize` and be convertible
/// in both directions using the `Index` trait; it is typically passed around
/// using `Copy`.  A suitable index type can be constructed with
/// [`define_index`].
#[derive(Clone, Debug)]
pub(crate) struct IndexMap<V, I> {
    data: Vec<V>,
    map: HashMap<V, I>,
}

impl<V, I> Default for IndexMap<V, I> {
    fn default() -> Self {
        Self {
            data: vec![],
            map: HashMap::new(),
        }
    }
}

pub(crate) trait Index {
    fn new(i: usize) -> Self;
    fn get(&self) -> usize;
}

impl<V, I> IndexMap<V, I>
where
    V: Eq + std::hash::Hash + Clone,
    I: Eq + std::hash::Hash + Copy + Index,
{
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn get_by_index(&self, i: I) -> Option<&V> {
        self.data.get(i.get())
    }

    /// Insert the given value into the map, returning a handle.
    ///
    /// If the value is already in the map, the handle will be to the existing
    /// instance (so it will not be inserted twice).
    pub fn insert(&mut self, v: V) -> I {
        *self.map.entry(v.clone()).or_insert_with(|| {
            let out = I::new(self.data.len());
            self.data.push(v);
            out
        })
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.map.clear();
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Defines an index type suitable for use in an [`IndexMap`].
macro_rules! define_index {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Copy, Clone, Default, Debug, Eq, PartialEq, Hash, Ord, PartialOrd,
        )]
        pub struct $name(usize);
        impl crate::context::indexed::Index for $name {
            fn new(i: usize) -> Self {
                Self(i)
            }
            fn get(&self) -> usize {
                self.0
            }
        }
    };
}
pub(crate) use define_index;
