//! PH-tree: a multidimensional bit trie over fixed-width keys.
//!
//! Every node splits its keys on one bit position, taking that bit from each
//! dimension to form a hypercube address with one bit per dimension. Bits
//! shared by all keys of a sub-tree are stored once in its node prefix, so
//! the depth is bounded by the 64 key bits, not by the number of entries.
//!
//! [`PhTree`] indexes raw `u64` keys; [`PhTreeF`] indexes `f64` points
//! through an order preserving encoding.
//!
//! # Example
//!
//! ```
//! use spatial_knn::phtree::{KeyEuclidean, PhTree};
//!
//! let mut tree = PhTree::new(2).unwrap();
//! tree.put(&[1, 1], "a").unwrap();
//! tree.put(&[5, 5], "b").unwrap();
//! tree.put(&[9, 2], "c").unwrap();
//!
//! let nearest = tree.nearest_neighbor(1, &KeyEuclidean, None, &[6, 6]).unwrap();
//! assert_eq!(*nearest[0].value, "b");
//! ```

mod bits;
mod distance;
mod float;
mod node;

use std::collections::btree_map;

use tracing::{debug, trace};

use crate::error::{Result, SpatialError};
use bits::mask_at_and_below;
use node::{Child, PhNode};

pub use bits::{f64_to_key, key_to_f64};
pub use distance::{FloatKeyDistance, KeyEuclidean, KeySquaredEuclidean, PhDimFilter, PhDistance};
pub use float::{FloatNeighbor, PhTreeF};

/// Largest supported dimensionality; hypercube addresses must fit a `u64`
/// with room to spare.
pub const MAX_PH_DIMENSIONALITY: usize = 62;

/// A stored key with its value and distance to a query key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhNeighbor<'a, T> {
    /// The stored key.
    pub key: &'a [u64],
    /// The stored value.
    pub value: &'a T,
    /// Distance to the query key.
    pub distance: f64,
}

/// PH-tree mapping `D`-dimensional `u64` keys to values.
#[derive(Debug, Clone)]
pub struct PhTree<T> {
    dimensionality: usize,
    root: PhNode<T>,
    len: usize,
    nodes: usize,
}

impl<T> PhTree<T> {
    /// Creates an empty tree.
    ///
    /// # Errors
    /// Returns [`SpatialError::InvalidDimensionality`] unless
    /// `1 <= dimensionality <= 62`.
    pub fn new(dimensionality: usize) -> Result<Self> {
        if !(1..=MAX_PH_DIMENSIONALITY).contains(&dimensionality) {
            return Err(SpatialError::InvalidDimensionality { actual: dimensionality, max: MAX_PH_DIMENSIONALITY });
        }
        Ok(Self { dimensionality, root: Self::empty_root(dimensionality), len: 0, nodes: 1 })
    }

    fn empty_root(dimensionality: usize) -> PhNode<T> {
        PhNode::new(bits::KEY_BITS - 1, &vec![0; dimensionality])
    }

    fn check_key(&self, key: &[u64]) -> Result<()> {
        SpatialError::check_dimension(self.dimensionality, key.len())
    }

    /// Number of dimensions of every key.
    #[must_use]
    pub const fn dimensionality(&self) -> usize {
        self.dimensionality
    }

    /// Number of stored entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of trie nodes, including the root.
    #[must_use]
    pub const fn node_count(&self) -> usize {
        self.nodes
    }

    /// Stores `value` under `key` and returns the value it replaced.
    ///
    /// # Errors
    /// Returns [`SpatialError::DimensionMismatch`] for a key of the wrong
    /// length.
    pub fn put(&mut self, key: &[u64], value: T) -> Result<Option<T>> {
        self.check_key(key)?;
        let (previous, created) = self.root.put(key, value);
        self.nodes += created;
        if previous.is_none() {
            self.len += 1;
        }
        Ok(previous)
    }

    /// The value stored under `key`.
    ///
    /// # Errors
    /// Returns [`SpatialError::DimensionMismatch`].
    pub fn get(&self, key: &[u64]) -> Result<Option<&T>> {
        self.check_key(key)?;
        Ok(self.root.get(key))
    }

    /// Mutable access to the value stored under `key`.
    ///
    /// # Errors
    /// Returns [`SpatialError::DimensionMismatch`].
    pub fn get_mut(&mut self, key: &[u64]) -> Result<Option<&mut T>> {
        self.check_key(key)?;
        Ok(self.root.get_mut(key))
    }

    /// Whether `key` is stored.
    ///
    /// # Errors
    /// Returns [`SpatialError::DimensionMismatch`].
    pub fn contains(&self, key: &[u64]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Removes `key` and returns its value.
    ///
    /// # Errors
    /// Returns [`SpatialError::DimensionMismatch`].
    pub fn remove(&mut self, key: &[u64]) -> Result<Option<T>> {
        self.check_key(key)?;
        Ok(self.root.remove(key).map(|removed| {
            self.len -= 1;
            self.nodes -= removed.nodes_freed;
            removed.value
        }))
    }

    /// Moves the value stored under `old` to `new`.
    ///
    /// Returns nothing and leaves the tree unchanged if `old` is absent or
    /// `new` is already taken by another entry.
    ///
    /// # Errors
    /// Returns [`SpatialError::DimensionMismatch`] for either key.
    pub fn update(&mut self, old: &[u64], new: &[u64]) -> Result<Option<&mut T>> {
        self.check_key(old)?;
        self.check_key(new)?;
        if old == new {
            return Ok(self.root.get_mut(old));
        }
        if self.root.get(new).is_some() {
            return Ok(None);
        }
        let Some(value) = self.remove(old)? else {
            return Ok(None);
        };
        let _ = self.put(new, value)?;
        self.get_mut(new)
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        debug!(entries = self.len, nodes = self.nodes, "clearing ph-tree");
        self.root = Self::empty_root(self.dimensionality);
        self.len = 0;
        self.nodes = 1;
    }

    /// All entries in hypercube (Z-) order.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, T> {
        Iter { stack: vec![self.root.children.values()], remaining: self.len }
    }

    /// Entries with `min[d] <= key[d] <= max[d]` in every dimension, in
    /// hypercube order.
    ///
    /// # Errors
    /// Returns [`SpatialError::DimensionMismatch`] for corners of the wrong
    /// length.
    pub fn query_window(&self, min: &[u64], max: &[u64]) -> Result<Vec<(&[u64], &T)>> {
        self.check_key(min)?;
        self.check_key(max)?;
        let mut found = Vec::new();
        window(&self.root, min, max, &mut found);
        Ok(found)
    }

    /// The `n_min` entries closest to `key`, closest first.
    ///
    /// More than `n_min` entries are returned when several share the
    /// distance of the last one; fewer only when the tree is smaller.
    /// `dims` restricts the dimensions `distance` looks at.
    ///
    /// # Errors
    /// Returns [`SpatialError::DimensionMismatch`] for a key or filter of
    /// the wrong dimensionality.
    pub fn nearest_neighbor(
        &self,
        n_min: usize,
        distance: &dyn PhDistance,
        dims: Option<&PhDimFilter>,
        key: &[u64],
    ) -> Result<Vec<PhNeighbor<'_, T>>> {
        self.check_key(key)?;
        let all;
        let dims = match dims {
            Some(filter) => {
                SpatialError::check_dimension(self.dimensionality, filter.dimensionality())?;
                filter
            }
            None => {
                all = PhDimFilter::all(self.dimensionality);
                &all
            }
        };
        if n_min == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        let mut search = NearestSearch { key, distance, dims, n_min, candidates: Vec::with_capacity(n_min + 1) };
        search.descend(&self.root);
        trace!(n_min, found = search.candidates.len(), "ph-tree nearest neighbor query");
        Ok(search.candidates)
    }

    /// Every entry within `radius` of `key`, closest first.
    ///
    /// # Errors
    /// Returns [`SpatialError::InvalidRadius`] for a negative or NaN radius,
    /// or [`SpatialError::DimensionMismatch`].
    pub fn range(&self, distance: &dyn PhDistance, key: &[u64], radius: f64) -> Result<Vec<PhNeighbor<'_, T>>> {
        self.check_key(key)?;
        if radius.is_nan() || radius < 0.0 {
            return Err(SpatialError::InvalidRadius(radius));
        }
        let dims = PhDimFilter::all(self.dimensionality);
        let mut found = Vec::new();
        within(&self.root, &RangeQuery { key, distance, dims: &dims, radius }, &mut found);
        found.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(found)
    }
}

fn overlaps<T>(node: &PhNode<T>, min: &[u64], max: &[u64]) -> bool {
    let low = mask_at_and_below(node.bit);
    node.prefix.iter().zip(min.iter().zip(max)).all(|(&p, (&lo, &hi))| p <= hi && (p | low) >= lo)
}

fn window<'a, T>(node: &'a PhNode<T>, min: &[u64], max: &[u64], found: &mut Vec<(&'a [u64], &'a T)>) {
    for child in node.children.values() {
        match child {
            Child::Entry { key, value } => {
                if key.iter().zip(min.iter().zip(max)).all(|(k, (lo, hi))| lo <= k && k <= hi) {
                    found.push((&**key, value));
                }
            }
            Child::Node(sub) => {
                if overlaps(sub, min, max) {
                    window(sub, min, max, found);
                }
            }
        }
    }
}

struct NearestSearch<'a, 'q, T> {
    key: &'q [u64],
    distance: &'q dyn PhDistance,
    dims: &'q PhDimFilter,
    n_min: usize,
    candidates: Vec<PhNeighbor<'a, T>>,
}

impl<'a, T> NearestSearch<'a, '_, T> {
    /// Distance of the `n_min`-th candidate, or infinity while fewer are
    /// known.
    fn max_distance(&self) -> f64 {
        self.candidates.get(self.n_min - 1).map_or(f64::INFINITY, |c| c.distance)
    }

    fn offer(&mut self, neighbor: PhNeighbor<'a, T>) {
        let at = self.candidates.partition_point(|c| c.distance <= neighbor.distance);
        self.candidates.insert(at, neighbor);
        if self.candidates.len() > self.n_min {
            let cutoff = self.candidates[self.n_min - 1].distance;
            let keep = self.candidates.partition_point(|c| c.distance <= cutoff);
            self.candidates.truncate(keep);
        }
    }

    /// Visits the children of `node` in ascending order of their bound.
    fn descend(&mut self, node: &'a PhNode<T>) {
        let mut children: Vec<(f64, &'a Child<T>)> = node
            .children
            .values()
            .map(|child| {
                let bound = match child {
                    Child::Entry { key, .. } => self.distance.distance(self.key, key, self.dims),
                    Child::Node(sub) => {
                        let (lo, hi) = sub.region();
                        self.distance.min_dist(self.key, &lo, &hi, self.dims)
                    }
                };
                (bound, child)
            })
            .collect();
        children.sort_by(|a, b| a.0.total_cmp(&b.0));

        for (bound, child) in children {
            if bound > self.max_distance() {
                break;
            }
            match child {
                Child::Entry { key, value } => self.offer(PhNeighbor { key: &**key, value, distance: bound }),
                Child::Node(sub) => self.descend(sub),
            }
        }
    }
}

struct RangeQuery<'q> {
    key: &'q [u64],
    distance: &'q dyn PhDistance,
    dims: &'q PhDimFilter,
    radius: f64,
}

fn within<'a, T>(node: &'a PhNode<T>, query: &RangeQuery<'_>, found: &mut Vec<PhNeighbor<'a, T>>) {
    for child in node.children.values() {
        match child {
            Child::Entry { key, value } => {
                let distance = query.distance.distance(query.key, key, query.dims);
                if distance <= query.radius {
                    found.push(PhNeighbor { key: &**key, value, distance });
                }
            }
            Child::Node(sub) => {
                let (lo, hi) = sub.region();
                if query.distance.min_dist(query.key, &lo, &hi, query.dims) <= query.radius {
                    within(sub, query, found);
                }
            }
        }
    }
}

/// Iterator over the entries of a [`PhTree`].
#[derive(Debug)]
pub struct Iter<'a, T> {
    stack: Vec<btree_map::Values<'a, u64, Child<T>>>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (&'a [u64], &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.stack.last_mut()?.next() {
                None => {
                    let _ = self.stack.pop();
                }
                Some(Child::Entry { key, value }) => {
                    self.remaining -= 1;
                    return Some((&**key, value));
                }
                Some(Child::Node(sub)) => self.stack.push(sub.children.values()),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<'a, T> IntoIterator for &'a PhTree<T> {
    type Item = (&'a [u64], &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}
