//! Branch-and-bound queries over an [`RStarTree`](crate::RStarTree).
//!
//! Each algorithm is written once, generic over a [`RawMetric`] that maps
//! distances into an internal comparison space. Euclidean queries run in
//! squared space and take a single square root per reported value; every
//! other distance function is used as is through a trait object.

mod dispatch;
mod knn;
mod knn_heap;
mod priority;
mod range;

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::ops::Deref;

use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::distance::{SpatialDistance, squared_euclidean};
use crate::geometry::BoundingBox;
use crate::node::NodeId;
use crate::relation::ObjectId;
use crate::statistics::QueryCost;

pub use dispatch::{EngineKind, QueryEngine, query_engine};
pub use priority::PriorityCursor;

/// One query result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    /// The matching object.
    pub id: ObjectId,
    /// Its distance to the query.
    pub distance: f64,
}

/// Query results in ascending distance order, ties by ascending id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeighborList {
    neighbors: Vec<Neighbor>,
    cost: QueryCost,
}

impl NeighborList {
    pub(crate) const fn new(neighbors: Vec<Neighbor>, cost: QueryCost) -> Self {
        Self { neighbors, cost }
    }

    /// Work performed to answer the query.
    #[must_use]
    pub const fn cost(&self) -> QueryCost {
        self.cost
    }

    /// Identifiers in result order.
    #[must_use]
    pub fn ids(&self) -> Vec<ObjectId> {
        self.neighbors.iter().map(|n| n.id).collect()
    }

    /// Distance of the last (farthest) result.
    #[must_use]
    pub fn max_distance(&self) -> Option<f64> {
        self.neighbors.last().map(|n| n.distance)
    }

    /// The results.
    #[must_use]
    pub fn into_vec(self) -> Vec<Neighbor> {
        self.neighbors
    }
}

impl Deref for NeighborList {
    type Target = [Neighbor];

    fn deref(&self) -> &[Neighbor] {
        &self.neighbors
    }
}

impl IntoIterator for NeighborList {
    type Item = Neighbor;
    type IntoIter = std::vec::IntoIter<Neighbor>;

    fn into_iter(self) -> Self::IntoIter {
        self.neighbors.into_iter()
    }
}

impl<'a> IntoIterator for &'a NeighborList {
    type Item = &'a Neighbor;
    type IntoIter = std::slice::Iter<'a, Neighbor>;

    fn into_iter(self) -> Self::IntoIter {
        self.neighbors.iter()
    }
}

/// Sorts by distance, then id.
pub(crate) fn sort_neighbors(neighbors: &mut [Neighbor]) {
    neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
}

/// A distance function expressed in an internal comparison space.
///
/// `to_raw` and `from_raw` are monotone and `raw <= to_raw(t)` holds exactly
/// when `from_raw(raw) <= t`.
pub(crate) trait RawMetric {
    /// Exact distance in raw space.
    fn raw_distance(&self, a: &[f64], b: &[f64]) -> f64;

    /// Lower bound in raw space.
    fn raw_min_dist(&self, point: &[f64], mbr: &BoundingBox) -> f64;

    /// Largest raw value that reports as at most `threshold`.
    fn to_raw(&self, threshold: f64) -> f64;

    /// Reported distance of a raw value.
    fn from_raw(&self, raw: f64) -> f64;
}

/// Euclidean distance compared in squared space.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EuclideanRaw;

impl RawMetric for EuclideanRaw {
    #[inline]
    fn raw_distance(&self, a: &[f64], b: &[f64]) -> f64 {
        squared_euclidean(a, b)
    }

    #[inline]
    fn raw_min_dist(&self, point: &[f64], mbr: &BoundingBox) -> f64 {
        mbr.min_dist_squared(point)
    }

    fn to_raw(&self, threshold: f64) -> f64 {
        if threshold.is_nan() || threshold <= 0.0 || threshold == f64::INFINITY {
            // raw values are never negative
            return if threshold > 0.0 { threshold } else { threshold.min(0.0) };
        }
        // correct the rounding of the square so that sqrt agrees with it
        let mut raw = threshold * threshold;
        while raw > 0.0 && raw.sqrt() > threshold {
            raw = raw.next_down();
        }
        while raw < f64::MAX && raw.next_up().sqrt() <= threshold {
            raw = raw.next_up();
        }
        raw
    }

    #[inline]
    fn from_raw(&self, raw: f64) -> f64 {
        if raw < 0.0 { raw } else { raw.sqrt() }
    }
}

/// Any distance function, compared as reported.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DynRaw<'a>(pub(crate) &'a dyn SpatialDistance);

impl RawMetric for DynRaw<'_> {
    #[inline]
    fn raw_distance(&self, a: &[f64], b: &[f64]) -> f64 {
        self.0.distance(a, b)
    }

    #[inline]
    fn raw_min_dist(&self, point: &[f64], mbr: &BoundingBox) -> f64 {
        self.0.min_dist(point, mbr)
    }

    fn to_raw(&self, threshold: f64) -> f64 {
        threshold
    }

    fn from_raw(&self, raw: f64) -> f64 {
        raw
    }
}

/// Min-heap of nodes keyed by their lower bound.
#[derive(Debug, Default)]
pub(crate) struct NodeQueue {
    heap: BinaryHeap<Reverse<(OrderedFloat<f64>, NodeId)>>,
}

impl NodeQueue {
    pub(crate) fn push(&mut self, bound: f64, node: NodeId) {
        self.heap.push(Reverse((OrderedFloat(bound), node)));
    }

    pub(crate) fn pop(&mut self) -> Option<(f64, NodeId)> {
        self.heap.pop().map(|Reverse((bound, node))| (bound.0, node))
    }

    pub(crate) fn peek_bound(&self) -> Option<f64> {
        self.heap.peek().map(|Reverse((bound, _))| bound.0)
    }

    pub(crate) fn clear(&mut self) {
        self.heap.clear();
    }
}
