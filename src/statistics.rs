//! Diagnostic query counters.
//!
//! Counters are best effort: they are updated with relaxed atomics, saturate
//! instead of wrapping and never influence query results.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Cost of a single query, accumulated locally and merged into the tree
/// counters once the query finishes.
///
/// Every evaluation of the distance function is counted: exact distances to
/// stored points in `distance_computations`, lower bounds to node boxes in
/// `bound_computations`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueryCost {
    /// Exact distance evaluations between the query and stored points.
    pub distance_computations: u64,
    /// Lower bound evaluations between the query and node boxes.
    pub bound_computations: u64,
    /// Nodes whose entries were examined.
    pub nodes_visited: u64,
}

impl QueryCost {
    #[inline]
    pub(crate) const fn distance(&mut self) {
        self.distance_computations = self.distance_computations.saturating_add(1);
    }

    #[inline]
    pub(crate) const fn bound(&mut self) {
        self.bound_computations = self.bound_computations.saturating_add(1);
    }

    #[inline]
    pub(crate) const fn node(&mut self) {
        self.nodes_visited = self.nodes_visited.saturating_add(1);
    }
}

/// The kind of query being accounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueryKind {
    Knn,
    Range,
    Priority,
}

/// Tree-wide query counters.
#[derive(Debug, Default)]
pub struct Statistics {
    distance_computations: AtomicU64,
    bound_computations: AtomicU64,
    nodes_visited: AtomicU64,
    knn_queries: AtomicU64,
    range_queries: AtomicU64,
    priority_searches: AtomicU64,
}

fn saturating_add(counter: &AtomicU64, value: u64) {
    if value == 0 {
        return;
    }
    let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        Some(current.saturating_add(value))
    });
}

impl Statistics {
    /// Counts a started query of `kind`.
    pub(crate) fn count_query(&self, kind: QueryKind) {
        let counter = match kind {
            QueryKind::Knn => &self.knn_queries,
            QueryKind::Range => &self.range_queries,
            QueryKind::Priority => &self.priority_searches,
        };
        saturating_add(counter, 1);
    }

    /// Merges the cost of a finished query.
    pub(crate) fn merge(&self, cost: &QueryCost) {
        saturating_add(&self.distance_computations, cost.distance_computations);
        saturating_add(&self.bound_computations, cost.bound_computations);
        saturating_add(&self.nodes_visited, cost.nodes_visited);
    }

    /// Copies the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            distance_computations: self.distance_computations.load(Ordering::Relaxed),
            bound_computations: self.bound_computations.load(Ordering::Relaxed),
            nodes_visited: self.nodes_visited.load(Ordering::Relaxed),
            knn_queries: self.knn_queries.load(Ordering::Relaxed),
            range_queries: self.range_queries.load(Ordering::Relaxed),
            priority_searches: self.priority_searches.load(Ordering::Relaxed),
        }
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.distance_computations,
            &self.bound_computations,
            &self.nodes_visited,
            &self.knn_queries,
            &self.range_queries,
            &self.priority_searches,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// A point-in-time copy of [`Statistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatisticsSnapshot {
    /// Exact distance evaluations over all queries.
    pub distance_computations: u64,
    /// Lower bound evaluations over all queries.
    pub bound_computations: u64,
    /// Nodes examined over all queries.
    pub nodes_visited: u64,
    /// kNN queries, including those answered by priority search.
    pub knn_queries: u64,
    /// Range queries, including those answered by priority search.
    pub range_queries: u64,
    /// Searches started on a [`PriorityCursor`](crate::PriorityCursor).
    /// kNN and range queries answered by priority search are not included.
    pub priority_searches: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_and_snapshot() {
        let stats = Statistics::default();
        stats.count_query(QueryKind::Knn);
        stats.count_query(QueryKind::Range);
        stats.merge(&QueryCost { distance_computations: 7, bound_computations: 4, nodes_visited: 2 });
        let snap = stats.snapshot();
        assert_eq!(snap.knn_queries, 1);
        assert_eq!(snap.range_queries, 1);
        assert_eq!(snap.priority_searches, 0);
        assert_eq!(snap.distance_computations, 7);
        assert_eq!(snap.bound_computations, 4);
        assert_eq!(snap.nodes_visited, 2);

        stats.reset();
        assert_eq!(stats.snapshot(), StatisticsSnapshot::default());
    }

    #[test]
    fn test_saturates() {
        let stats = Statistics::default();
        stats.merge(&QueryCost { distance_computations: u64::MAX - 1, ..Default::default() });
        stats.merge(&QueryCost { distance_computations: 5, ..Default::default() });
        assert_eq!(stats.snapshot().distance_computations, u64::MAX);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(StatisticsSnapshot { knn_queries: 3, ..Default::default() }).unwrap();
        assert_eq!(json["knn_queries"], 3);
    }
}
