//! Incremental best-first search.
//!
//! A cursor walks the leaf entries of the tree in ascending order of the
//! lower bound of their leaf. The caller decides when to stop: it may
//! tighten the cutoff at any time, and every node whose bound exceeds the
//! cutoff is skipped without being read.

use tracing::trace;

use super::knn_heap::KnnHeap;
use super::{DynRaw, EuclideanRaw, Neighbor, NeighborList, NodeQueue, RawMetric, sort_neighbors};
use crate::error::{Result, SpatialError};
use crate::node::{Entries, LeafEntry, NodeId};
use crate::relation::ObjectId;
use crate::rstar_tree::RStarTree;
use crate::statistics::{QueryCost, QueryKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Unstarted,
    Positioned { node: NodeId, index: usize },
    Exhausted,
}

/// Priority search cursor, generic over the comparison space.
#[derive(Debug)]
pub(crate) struct PrioritySearch<'a, M> {
    tree: &'a RStarTree,
    metric: M,
    query: Box<[f64]>,
    queue: NodeQueue,
    /// Raw cutoff; nodes with a larger bound are never read.
    cutoff: f64,
    state: CursorState,
    /// Raw bound of the leaf the cursor is positioned in.
    bound: f64,
    /// Raw exact distance of the current entry, once computed.
    exact: Option<f64>,
    cost: QueryCost,
}

impl<'a, M: RawMetric> PrioritySearch<'a, M> {
    pub(crate) fn new(tree: &'a RStarTree, metric: M) -> Self {
        Self {
            tree,
            metric,
            query: Box::default(),
            queue: NodeQueue::default(),
            cutoff: f64::INFINITY,
            state: CursorState::Unstarted,
            bound: 0.0,
            exact: None,
            cost: QueryCost::default(),
        }
    }

    /// Restarts the search from `query`, already validated. Callers count
    /// the query under their own kind.
    pub(crate) fn search(&mut self, query: &[f64]) {
        self.flush_cost();
        self.query = query.into();
        self.cutoff = f64::INFINITY;
        self.queue.clear();
        self.queue.push(0.0, self.tree.root_id());
        self.state = CursorState::Unstarted;
        self.exact = None;
        self.advance();
    }

    pub(crate) fn advance(&mut self) {
        self.exact = None;
        match self.state {
            CursorState::Exhausted => return,
            CursorState::Positioned { node, index } => {
                if index + 1 < self.tree.get_node(node).leaf_entries().len() {
                    if self.bound > self.cutoff {
                        self.exhaust();
                    } else {
                        self.state = CursorState::Positioned { node, index: index + 1 };
                    }
                    return;
                }
            }
            CursorState::Unstarted => {}
        }

        while let Some((bound, id)) = self.queue.pop() {
            if bound > self.cutoff {
                break;
            }
            let node = self.tree.get_node(id);
            self.cost.node();
            match &node.entries {
                Entries::Leaf(entries) => {
                    if !entries.is_empty() {
                        self.state = CursorState::Positioned { node: id, index: 0 };
                        self.bound = bound;
                        return;
                    }
                }
                Entries::Directory(entries) => {
                    for entry in entries {
                        self.cost.bound();
                        // a child is never closer than its parent
                        let child = self.metric.raw_min_dist(&self.query, &entry.mbr).max(bound);
                        if child <= self.cutoff {
                            self.queue.push(child, entry.child);
                        }
                    }
                }
            }
        }
        self.exhaust();
    }

    fn exhaust(&mut self) {
        self.queue.clear();
        self.state = CursorState::Exhausted;
    }

    pub(crate) const fn valid(&self) -> bool {
        matches!(self.state, CursorState::Positioned { .. })
    }

    fn current(&self) -> Option<&'a LeafEntry> {
        match self.state {
            CursorState::Positioned { node, index } => self.tree.get_node(node).leaf_entries().get(index),
            CursorState::Unstarted | CursorState::Exhausted => None,
        }
    }

    pub(crate) fn lower_bound_raw(&self) -> f64 {
        if self.valid() { self.bound } else { f64::INFINITY }
    }

    pub(crate) fn all_lower_bound_raw(&self) -> f64 {
        let queued = self.queue.peek_bound().unwrap_or(f64::INFINITY);
        if self.valid() { self.bound.min(queued) } else { queued }
    }

    pub(crate) fn exact_distance_raw(&mut self) -> Option<f64> {
        if self.exact.is_none() {
            let entry = self.current()?;
            self.cost.distance();
            self.exact = Some(self.metric.raw_distance(&self.query, &entry.point));
        }
        self.exact
    }

    pub(crate) fn decrease_cutoff_raw(&mut self, raw: f64) -> Result<()> {
        if raw.is_nan() {
            return Err(SpatialError::InvalidRadius(raw));
        }
        if raw > self.cutoff {
            return Err(SpatialError::CutoffIncreased {
                current: self.metric.from_raw(self.cutoff),
                requested: self.metric.from_raw(raw),
            });
        }
        self.cutoff = raw;
        Ok(())
    }

    pub(crate) fn decrease_cutoff(&mut self, threshold: f64) -> Result<()> {
        if threshold.is_nan() {
            return Err(SpatialError::InvalidRadius(threshold));
        }
        let raw = self.metric.to_raw(threshold);
        if raw > self.cutoff {
            return Err(SpatialError::CutoffIncreased { current: self.metric.from_raw(self.cutoff), requested: threshold });
        }
        self.cutoff = raw;
        Ok(())
    }

    fn flush_cost(&mut self) {
        self.tree.stats().merge(&std::mem::take(&mut self.cost));
    }

    /// kNN answered by tightening the cutoff to the k-th best distance.
    pub(crate) fn knn(mut self, query: &[f64], k: usize) -> NeighborList {
        self.tree.stats().count_query(QueryKind::Knn);
        self.search(query);
        let mut candidates = KnnHeap::new(k);
        while let (Some(id), Some(distance)) = (self.current().map(|e| e.id), self.exact_distance_raw()) {
            if candidates.insert(distance, id) && candidates.is_full() {
                let tightened = self.decrease_cutoff_raw(candidates.max_distance());
                debug_assert!(tightened.is_ok(), "k-th best distance can only shrink");
            }
            self.advance();
        }
        let cost = self.cost;
        let neighbors = candidates.into_neighbors(&self.metric);
        trace!(k, found = neighbors.len(), nodes = cost.nodes_visited, "knn by priority search");
        NeighborList::new(neighbors, cost)
    }

    /// Range query answered with a fixed cutoff.
    pub(crate) fn range(mut self, query: &[f64], radius: f64) -> NeighborList {
        self.tree.stats().count_query(QueryKind::Range);
        self.search(query);
        let threshold = self.metric.to_raw(radius);
        self.cutoff = threshold;
        let mut found = Vec::new();
        while let (Some(id), Some(raw)) = (self.current().map(|e| e.id), self.exact_distance_raw()) {
            if raw <= threshold {
                found.push(Neighbor { id, distance: self.metric.from_raw(raw) });
            }
            self.advance();
        }
        sort_neighbors(&mut found);
        let cost = self.cost;
        trace!(radius, found = found.len(), nodes = cost.nodes_visited, "range by priority search");
        NeighborList::new(found, cost)
    }
}

impl<M> Drop for PrioritySearch<'_, M> {
    fn drop(&mut self) {
        self.tree.stats().merge(&self.cost);
    }
}

#[derive(Debug)]
enum Cursor<'a> {
    Euclidean(PrioritySearch<'a, EuclideanRaw>),
    Generic(PrioritySearch<'a, DynRaw<'a>>),
}

macro_rules! with_cursor {
    ($self:expr, $cursor:ident => $body:expr) => {
        match $self {
            Cursor::Euclidean($cursor) => $body,
            Cursor::Generic($cursor) => $body,
        }
    };
}

/// An incremental best-first search over an [`RStarTree`].
///
/// The cursor is positioned on one stored point at a time. Points are
/// visited in ascending order of [`lower_bound`](Self::lower_bound), a
/// proven lower bound of their distance to the query which never decreases
/// during a search. Exact distances are only computed on request.
///
/// # Example
///
/// ```
/// use spatial_knn::prelude::*;
///
/// let tree = RStarTree::bulk_load(1, TreeConfig::default(), (0..5u64).map(|i| (ObjectId(i), [i as f64]))).unwrap();
/// let mut cursor = tree.priority_search(&[2.2], &EuclideanDistance).unwrap();
/// let mut closest = None;
/// while cursor.valid() {
///     let distance = cursor.compute_exact_distance().unwrap();
///     if distance < 0.5 {
///         closest = cursor.current_id();
///         cursor.decrease_cutoff(distance).unwrap();
///     }
///     cursor.advance();
/// }
/// assert_eq!(closest, Some(ObjectId(2)));
/// ```
#[derive(Debug)]
pub struct PriorityCursor<'a> {
    inner: Cursor<'a>,
}

impl<'a> PriorityCursor<'a> {
    pub(crate) fn euclidean(tree: &'a RStarTree, query: &[f64]) -> Self {
        tree.stats().count_query(QueryKind::Priority);
        let mut search = PrioritySearch::new(tree, EuclideanRaw);
        search.search(query);
        Self { inner: Cursor::Euclidean(search) }
    }

    pub(crate) fn generic(tree: &'a RStarTree, metric: DynRaw<'a>, query: &[f64]) -> Self {
        tree.stats().count_query(QueryKind::Priority);
        let mut search = PrioritySearch::new(tree, metric);
        search.search(query);
        Self { inner: Cursor::Generic(search) }
    }

    /// Restarts the search from a new query point.
    ///
    /// # Errors
    /// Returns [`SpatialError::DimensionMismatch`] or
    /// [`SpatialError::InvalidCoordinate`].
    pub fn search(&mut self, query: &[f64]) -> Result<()> {
        with_cursor!(&mut self.inner, c => {
            c.tree.check_point(query)?;
            c.tree.stats().count_query(QueryKind::Priority);
            c.search(query);
        });
        Ok(())
    }

    /// Moves to the next point, or exhausts the cursor.
    pub fn advance(&mut self) {
        with_cursor!(&mut self.inner, c => c.advance());
    }

    /// Whether the cursor is positioned on a point.
    #[must_use]
    pub fn valid(&self) -> bool {
        with_cursor!(&self.inner, c => c.valid())
    }

    /// Lower bound of the current point's distance; infinity when exhausted.
    #[must_use]
    pub fn lower_bound(&self) -> f64 {
        with_cursor!(&self.inner, c => c.metric.from_raw(c.lower_bound_raw()))
    }

    /// Lower bound of the distance of every point not yet passed.
    #[must_use]
    pub fn all_lower_bound(&self) -> f64 {
        with_cursor!(&self.inner, c => c.metric.from_raw(c.all_lower_bound_raw()))
    }

    /// Exact distance of the current point, computed once and cached.
    pub fn compute_exact_distance(&mut self) -> Option<f64> {
        with_cursor!(&mut self.inner, c => c.exact_distance_raw().map(|raw| c.metric.from_raw(raw)))
    }

    /// Identifier of the current point.
    #[must_use]
    pub fn current_id(&self) -> Option<ObjectId> {
        with_cursor!(&self.inner, c => c.current().map(|e| e.id))
    }

    /// Coordinates of the current point.
    #[must_use]
    pub fn current_point(&self) -> Option<&'a [f64]> {
        with_cursor!(&self.inner, c => c.current().map(|e| &*e.point))
    }

    /// Lowers the cutoff; nodes whose bound exceeds it are skipped.
    ///
    /// # Errors
    /// Returns [`SpatialError::CutoffIncreased`] if `threshold` is larger
    /// than the current cutoff, leaving the cursor unchanged.
    pub fn decrease_cutoff(&mut self, threshold: f64) -> Result<()> {
        with_cursor!(&mut self.inner, c => c.decrease_cutoff(threshold))
    }

    /// Lowers the cutoff with a value in the internal comparison space,
    /// which is the squared distance for Euclidean searches.
    ///
    /// # Errors
    /// Returns [`SpatialError::CutoffIncreased`] if the value increases.
    pub fn decrease_cutoff_raw(&mut self, raw: f64) -> Result<()> {
        with_cursor!(&mut self.inner, c => c.decrease_cutoff_raw(raw))
    }

    /// Work performed so far and not yet merged into the tree statistics.
    #[must_use]
    pub fn cost(&self) -> QueryCost {
        with_cursor!(&self.inner, c => c.cost)
    }
}

impl Iterator for PriorityCursor<'_> {
    type Item = Neighbor;

    /// Yields every remaining point with its exact distance, in order of
    /// lower bound.
    fn next(&mut self) -> Option<Neighbor> {
        let id = self.current_id()?;
        let distance = self.compute_exact_distance()?;
        self.advance();
        Some(Neighbor { id, distance })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeConfig;
    use crate::distance::{EuclideanDistance, ManhattanDistance};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_tree(seed: u64, n: usize, dim: usize) -> RStarTree {
        let mut rng = StdRng::seed_from_u64(seed);
        let points: Vec<Vec<f64>> = (0..n).map(|_| (0..dim).map(|_| rng.random_range(0.0..1.0)).collect()).collect();
        RStarTree::bulk_load(dim, TreeConfig::default().with_capacity(8), points.iter().enumerate().map(|(i, p)| (ObjectId(i as u64), p)))
            .unwrap()
    }

    #[test]
    fn test_lower_bound_is_monotone_and_sound() {
        let tree = random_tree(1, 2000, 3);
        for distance in [&EuclideanDistance as &dyn crate::distance::SpatialDistance, &ManhattanDistance] {
            let mut cursor = tree.priority_search(&[0.5, 0.5, 0.5], distance).unwrap();
            let mut previous = 0.0;
            let mut seen = 0;
            while cursor.valid() {
                let bound = cursor.lower_bound();
                assert!(bound >= previous, "lower bound decreased from {previous} to {bound}");
                assert!(cursor.all_lower_bound() <= bound, "global bound above current bound");
                let exact = cursor.compute_exact_distance().unwrap();
                assert!(bound <= exact + 1e-12, "bound {bound} exceeds exact {exact}");
                previous = bound;
                seen += 1;
                cursor.advance();
            }
            assert_eq!(seen, 2000, "{} visited a wrong number of points", distance.name());
            assert_eq!(cursor.lower_bound(), f64::INFINITY);
            assert_eq!(cursor.current_id(), None);
        }
    }

    #[test]
    fn test_increasing_cutoff_rejected() {
        let tree = random_tree(2, 100, 2);
        let mut cursor = tree.priority_search(&[0.1, 0.1], &EuclideanDistance).unwrap();
        cursor.decrease_cutoff(0.5).unwrap();
        let before = cursor.current_id();
        let err = cursor.decrease_cutoff(0.7).unwrap_err();
        assert!(matches!(err, SpatialError::CutoffIncreased { .. }));
        assert_eq!(cursor.current_id(), before, "rejected cutoff moved the cursor");
        cursor.decrease_cutoff(0.5).unwrap();
        assert!(cursor.decrease_cutoff(f64::NAN).is_err());
    }

    #[test]
    fn test_raw_cutoff_is_squared_for_euclidean() {
        let tree = random_tree(3, 100, 2);
        let mut cursor = tree.priority_search(&[0.5, 0.5], &EuclideanDistance).unwrap();
        cursor.decrease_cutoff(0.5).unwrap();
        // 0.3 squared is below 0.25
        assert!(cursor.decrease_cutoff_raw(0.3).is_err());
        cursor.decrease_cutoff_raw(0.04).unwrap();
        assert!(cursor.decrease_cutoff(0.3).is_err());
        for neighbor in cursor {
            assert!(neighbor.distance.is_finite());
        }
    }

    #[test]
    fn test_zero_cutoff_stops_early() {
        let tree = random_tree(4, 1000, 2);
        let mut cursor = tree.priority_search(&[5.0, 5.0], &EuclideanDistance).unwrap();
        cursor.decrease_cutoff(0.0).unwrap();
        cursor.advance();
        // the point set lies far away, so nothing survives the cutoff
        while cursor.valid() {
            cursor.advance();
        }
        assert!(cursor.cost().nodes_visited <= u64::from(tree.height()), "read nodes past the cutoff");
    }

    #[test]
    fn test_drop_merges_cost() {
        let tree = random_tree(5, 200, 2);
        tree.reset_statistics();
        {
            let mut cursor = tree.priority_search(&[0.5, 0.5], &EuclideanDistance).unwrap();
            let _ = cursor.compute_exact_distance();
        }
        let stats = tree.statistics();
        assert_eq!(stats.priority_searches, 1);
        assert_eq!(stats.distance_computations, 1);
        assert!(stats.nodes_visited >= 1);
        assert!(stats.bound_computations >= 1, "the root's children were bounded");
    }

    #[test]
    fn test_consumers_count_under_their_own_kind() {
        let tree = random_tree(7, 200, 2);
        tree.reset_statistics();
        let knn = tree.query(&ManhattanDistance).knn_by_priority(&[0.3, 0.3], 5).unwrap();
        let range = tree.query(&EuclideanDistance).range_by_priority(&[0.3, 0.3], 0.1).unwrap();
        let stats = tree.statistics();
        assert_eq!((stats.knn_queries, stats.range_queries, stats.priority_searches), (1, 1, 0));
        assert_eq!(stats.bound_computations, knn.cost().bound_computations + range.cost().bound_computations);

        let mut cursor = tree.priority_search(&[0.3, 0.3], &EuclideanDistance).unwrap();
        cursor.search(&[0.6, 0.6]).unwrap();
        assert_eq!(tree.statistics().priority_searches, 2, "a restart is a new search");
    }

    #[test]
    fn test_restart() {
        let tree = random_tree(6, 300, 2);
        let mut cursor = tree.priority_search(&[0.0, 0.0], &EuclideanDistance).unwrap();
        cursor.decrease_cutoff(0.0).unwrap();
        cursor.search(&[1.0, 1.0]).unwrap();
        assert!(cursor.valid(), "restart must reset the cutoff");
        assert!(cursor.search(&[1.0]).is_err());
    }
}
