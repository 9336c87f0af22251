use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;

use super::{Neighbor, RawMetric};
use crate::relation::ObjectId;

/// The `k` best candidates seen so far, as a bounded max-heap.
///
/// Candidates compare by `(distance, id)`, so among equal distances the
/// larger id is evicted first.
#[derive(Debug)]
pub(crate) struct KnnHeap {
    k: usize,
    heap: BinaryHeap<(OrderedFloat<f64>, ObjectId)>,
}

impl KnnHeap {
    pub(crate) fn new(k: usize) -> Self {
        debug_assert!(k >= 1, "k must be positive");
        Self { k, heap: BinaryHeap::with_capacity(k.saturating_add(1).min(4096)) }
    }

    /// Offers a candidate; returns whether it was kept.
    pub(crate) fn insert(&mut self, distance: f64, id: ObjectId) -> bool {
        let candidate = (OrderedFloat(distance), id);
        if self.heap.len() < self.k {
            self.heap.push(candidate);
            return true;
        }
        match self.heap.peek() {
            Some(worst) if candidate < *worst => {
                let _ = self.heap.pop();
                self.heap.push(candidate);
                true
            }
            _ => false,
        }
    }

    /// Distance of the k-th best candidate, or infinity while fewer than
    /// `k` are known.
    pub(crate) fn max_distance(&self) -> f64 {
        if self.heap.len() < self.k {
            f64::INFINITY
        } else {
            self.heap.peek().map_or(f64::INFINITY, |(d, _)| d.0)
        }
    }

    pub(crate) fn is_full(&self) -> bool {
        self.heap.len() >= self.k
    }

    /// Results in ascending order with distances mapped out of raw space.
    pub(crate) fn into_neighbors<M: RawMetric>(self, metric: &M) -> Vec<Neighbor> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|(d, id)| Neighbor { id, distance: metric.from_raw(d.0) })
            .collect()
    }
}
