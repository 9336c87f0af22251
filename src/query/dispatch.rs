//! Selection of a query implementation for a distance function.

use super::priority::PrioritySearch;
use super::{DynRaw, EuclideanRaw, NeighborList, PriorityCursor, knn, range};
use crate::distance::{MetricKind, SpatialDistance, check_distance_dimensionality, metric_kind};
use crate::error::{Result, SpatialError};
use crate::relation::{ObjectId, PointAccessor};
use crate::rstar_tree::RStarTree;

/// Which implementation a [`QueryEngine`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EngineKind {
    /// Squared Euclidean comparisons, one square root per reported value.
    Euclidean,
    /// Any [`SpatialDistance`], used through its lower bound.
    Generic,
}

/// kNN, range and priority queries over one tree with one distance function.
///
/// Obtained from [`query_engine`] or [`RStarTree::query`]. Every method
/// validates its arguments and leaves the tree untouched on error.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub enum QueryEngine<'a> {
    /// Specialized engine for [`EuclideanDistance`](crate::distance::EuclideanDistance).
    Euclidean {
        /// The indexed tree.
        tree: &'a RStarTree,
    },
    /// Engine for any other distance function.
    Generic {
        /// The indexed tree.
        tree: &'a RStarTree,
        /// Distance used for exact values and lower bounds.
        distance: &'a dyn SpatialDistance,
    },
}

/// Selects the query implementation for `distance` over `tree`.
///
/// Only the canonical [`EuclideanDistance`](crate::distance::EuclideanDistance)
/// type gets the squared engine; the choice depends on nothing but the
/// concrete type of `distance` (see [`metric_kind`]).
#[must_use]
pub fn query_engine<'a>(tree: &'a RStarTree, distance: &'a dyn SpatialDistance) -> QueryEngine<'a> {
    match metric_kind(distance) {
        MetricKind::Euclidean => QueryEngine::Euclidean { tree },
        _ => QueryEngine::Generic { tree, distance },
    }
}

impl<'a> QueryEngine<'a> {
    /// Which implementation this engine runs.
    #[must_use]
    pub const fn kind(&self) -> EngineKind {
        match self {
            Self::Euclidean { .. } => EngineKind::Euclidean,
            Self::Generic { .. } => EngineKind::Generic,
        }
    }

    /// The tree being queried.
    #[must_use]
    pub const fn tree(&self) -> &'a RStarTree {
        match *self {
            Self::Euclidean { tree } | Self::Generic { tree, .. } => tree,
        }
    }

    /// The `k` nearest neighbors of `query`, closest first.
    ///
    /// Ties are broken by ascending id and the result holds `min(k, len)`
    /// entries.
    ///
    /// # Errors
    /// Returns [`SpatialError::InvalidK`] for `k == 0`,
    /// [`SpatialError::DimensionMismatch`] or
    /// [`SpatialError::InvalidCoordinate`] for a bad query point, and
    /// [`SpatialError::DimensionMismatch`] for a distance bound to another
    /// dimensionality than the tree.
    pub fn knn(&self, query: &[f64], k: usize) -> Result<NeighborList> {
        self.check_knn(query, k)?;
        Ok(match *self {
            Self::Euclidean { tree } => knn::knn(tree, &EuclideanRaw, query, k),
            Self::Generic { tree, distance } => knn::knn(tree, &DynRaw(distance), query, k),
        })
    }

    /// Every stored point within `radius` of `query`, inclusive, closest
    /// first.
    ///
    /// # Errors
    /// Returns [`SpatialError::InvalidRadius`] for a negative or NaN radius,
    /// or the query point errors of [`QueryEngine::knn`].
    pub fn range(&self, query: &[f64], radius: f64) -> Result<NeighborList> {
        self.check_range(query, radius)?;
        Ok(match *self {
            Self::Euclidean { tree } => range::range(tree, &EuclideanRaw, query, radius),
            Self::Generic { tree, distance } => range::range(tree, &DynRaw(distance), query, radius),
        })
    }

    /// Starts an incremental best-first search from `query`.
    ///
    /// # Errors
    /// Returns the query point errors of [`QueryEngine::knn`].
    pub fn priority_search(&self, query: &[f64]) -> Result<PriorityCursor<'a>> {
        self.check_query(query)?;
        Ok(match *self {
            Self::Euclidean { tree } => PriorityCursor::euclidean(tree, query),
            Self::Generic { tree, distance } => PriorityCursor::generic(tree, DynRaw(distance), query),
        })
    }

    /// kNN answered by a priority search that tightens its cutoff to the
    /// k-th best distance found so far. Returns the same neighbors as
    /// [`QueryEngine::knn`].
    ///
    /// # Errors
    /// Same as [`QueryEngine::knn`].
    pub fn knn_by_priority(&self, query: &[f64], k: usize) -> Result<NeighborList> {
        self.check_knn(query, k)?;
        Ok(match *self {
            Self::Euclidean { tree } => PrioritySearch::new(tree, EuclideanRaw).knn(query, k),
            Self::Generic { tree, distance } => PrioritySearch::new(tree, DynRaw(distance)).knn(query, k),
        })
    }

    /// Range query answered by a priority search with its cutoff fixed at
    /// `radius`. Returns the same neighbors as [`QueryEngine::range`].
    ///
    /// # Errors
    /// Same as [`QueryEngine::range`].
    pub fn range_by_priority(&self, query: &[f64], radius: f64) -> Result<NeighborList> {
        self.check_range(query, radius)?;
        Ok(match *self {
            Self::Euclidean { tree } => PrioritySearch::new(tree, EuclideanRaw).range(query, radius),
            Self::Generic { tree, distance } => PrioritySearch::new(tree, DynRaw(distance)).range(query, radius),
        })
    }

    /// kNN of a stored object, resolved through `accessor`. The object
    /// itself is part of the result when it is indexed.
    ///
    /// # Errors
    /// Returns [`SpatialError::UnknownObject`] if `accessor` does not know
    /// `id`, or the errors of [`QueryEngine::knn`].
    pub fn knn_by_id<A: PointAccessor + ?Sized>(&self, accessor: &A, id: ObjectId, k: usize) -> Result<NeighborList> {
        self.knn(accessor.require(id)?, k)
    }

    /// Range query around a stored object.
    ///
    /// # Errors
    /// Returns [`SpatialError::UnknownObject`] or the errors of
    /// [`QueryEngine::range`].
    pub fn range_by_id<A: PointAccessor + ?Sized>(
        &self,
        accessor: &A,
        id: ObjectId,
        radius: f64,
    ) -> Result<NeighborList> {
        self.range(accessor.require(id)?, radius)
    }

    /// Priority search around a stored object.
    ///
    /// # Errors
    /// Returns [`SpatialError::UnknownObject`] or the errors of
    /// [`QueryEngine::priority_search`].
    pub fn priority_search_by_id<A: PointAccessor + ?Sized>(
        &self,
        accessor: &A,
        id: ObjectId,
    ) -> Result<PriorityCursor<'a>> {
        self.priority_search(accessor.require(id)?)
    }

    fn check_knn(&self, query: &[f64], k: usize) -> Result<()> {
        if k < 1 {
            return Err(SpatialError::InvalidK(k));
        }
        self.check_query(query)
    }

    fn check_range(&self, query: &[f64], radius: f64) -> Result<()> {
        if radius.is_nan() || radius < 0.0 {
            return Err(SpatialError::InvalidRadius(radius));
        }
        self.check_query(query)
    }

    fn check_query(&self, query: &[f64]) -> Result<()> {
        match *self {
            Self::Euclidean { tree } => tree.check_point(query),
            Self::Generic { tree, distance } => {
                tree.check_point(query)?;
                check_distance_dimensionality(distance, tree.dimensionality())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeConfig;
    use crate::distance::{
        EuclideanDistance, ManhattanDistance, MinkowskiDistance, SquaredEuclideanDistance, WeightedEuclideanDistance,
    };
    use crate::relation::VectorRelation;

    fn grid_tree() -> (VectorRelation, RStarTree) {
        let relation =
            VectorRelation::from_vectors((0..10).flat_map(|x| (0..10).map(move |y| vec![f64::from(x), f64::from(y)])))
                .unwrap();
        let tree = RStarTree::from_relation(&relation, TreeConfig::default().with_capacity(6)).unwrap();
        (relation, tree)
    }

    #[test]
    fn test_dispatch_selects_by_kind() {
        let (_, tree) = grid_tree();
        assert_eq!(query_engine(&tree, &EuclideanDistance).kind(), EngineKind::Euclidean);
        assert_eq!(query_engine(&tree, &SquaredEuclideanDistance).kind(), EngineKind::Generic);
        assert_eq!(query_engine(&tree, &ManhattanDistance).kind(), EngineKind::Generic);
        // Minkowski with p = 2 computes Euclidean values but is not the canonical type
        let minkowski = MinkowskiDistance::new(2.0).unwrap();
        assert_eq!(query_engine(&tree, &minkowski).kind(), EngineKind::Generic);
    }

    #[test]
    fn test_dispatch_is_idempotent() {
        let (_, tree) = grid_tree();
        let before = tree.statistics();
        let _ = query_engine(&tree, &ManhattanDistance);
        assert_eq!(tree.statistics(), before, "dispatch must not touch the tree");

        for distance in [&EuclideanDistance as &dyn SpatialDistance, &ManhattanDistance, &SquaredEuclideanDistance] {
            let first = query_engine(&tree, distance);
            let second = query_engine(&tree, distance);
            assert_eq!(first.kind(), second.kind());
            for query in [[4.5, 4.5], [0.0, 9.0], [-2.0, 3.3]] {
                assert_eq!(
                    first.knn(&query, 5).unwrap().into_vec(),
                    second.knn(&query, 5).unwrap().into_vec(),
                    "{}: repeated dispatch must give the same neighbors",
                    distance.name()
                );
                assert_eq!(
                    first.range(&query, 2.0).unwrap().into_vec(),
                    second.range(&query, 2.0).unwrap().into_vec(),
                    "{}",
                    distance.name()
                );
            }
        }
    }

    /// Manhattan values under the name of the canonical Euclidean distance.
    #[derive(Debug)]
    struct LabeledManhattan;

    impl SpatialDistance for LabeledManhattan {
        fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
            ManhattanDistance.distance(a, b)
        }

        fn min_dist(&self, point: &[f64], mbr: &crate::BoundingBox) -> f64 {
            ManhattanDistance.min_dist(point, mbr)
        }

        fn min_dist_box(&self, a: &crate::BoundingBox, b: &crate::BoundingBox) -> f64 {
            ManhattanDistance.min_dist_box(a, b)
        }

        fn is_metric(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "euclidean"
        }
    }

    /// Forwards to the canonical Euclidean distance without being it.
    #[derive(Debug)]
    struct WrappedEuclidean(EuclideanDistance);

    impl SpatialDistance for WrappedEuclidean {
        fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
            self.0.distance(a, b)
        }

        fn min_dist(&self, point: &[f64], mbr: &crate::BoundingBox) -> f64 {
            self.0.min_dist(point, mbr)
        }

        fn min_dist_box(&self, a: &crate::BoundingBox, b: &crate::BoundingBox) -> f64 {
            self.0.min_dist_box(a, b)
        }

        fn is_metric(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            self.0.name()
        }
    }

    #[test]
    fn test_dispatch_uses_concrete_type() {
        let (_, tree) = grid_tree();
        let engine = query_engine(&tree, &LabeledManhattan);
        assert_eq!(engine.kind(), EngineKind::Generic, "a name alone must not select the squared engine");
        let nearest = engine.knn(&[0.0, 0.0], 1).unwrap();
        assert_eq!(nearest[0].distance, 0.0);
        let ring = engine.range(&[0.0, 0.0], 7.0).unwrap();
        let corner = ring.iter().find(|n| n.id == ObjectId(34)).unwrap();
        assert_eq!(corner.distance, 7.0, "(3, 4) is 7 away under Manhattan");

        assert_eq!(query_engine(&tree, &WrappedEuclidean(EuclideanDistance)).kind(), EngineKind::Generic);
        assert_eq!(
            tree.knn(&[2.2, 7.9], 6, &WrappedEuclidean(EuclideanDistance)).unwrap().into_vec(),
            tree.knn(&[2.2, 7.9], 6, &EuclideanDistance).unwrap().into_vec(),
            "both engines find the same neighbors"
        );
    }

    #[test]
    fn test_distance_dimensionality_is_checked() {
        let (relation, tree) = grid_tree();
        let weighted = WeightedEuclideanDistance::new(vec![1.0, 1.0, 1.0]).unwrap();
        let engine = tree.query(&weighted);
        let mismatch = SpatialError::DimensionMismatch { expected: 2, actual: 3 };
        assert_eq!(engine.knn(&[0.0, 0.0], 2).unwrap_err(), mismatch);
        assert_eq!(engine.range(&[0.0, 0.0], 1.0).unwrap_err(), mismatch);
        assert_eq!(engine.priority_search(&[0.0, 0.0]).unwrap_err(), mismatch);
        assert_eq!(engine.knn_by_priority(&[0.0, 0.0], 2).unwrap_err(), mismatch);
        assert_eq!(engine.range_by_priority(&[0.0, 0.0], 1.0).unwrap_err(), mismatch);
        assert_eq!(engine.knn_by_id(&relation, ObjectId(0), 2).unwrap_err(), mismatch);
        assert!(engine.priority_search_by_id(&relation, ObjectId(0)).is_err());

        let fitting = WeightedEuclideanDistance::new(vec![1.0, 4.0]).unwrap();
        let nearest = tree.knn(&[0.0, 0.0], 2, &fitting).unwrap();
        assert_eq!(nearest.ids(), vec![ObjectId(0), ObjectId(10)], "y steps cost twice as much");
        assert_eq!(nearest[1].distance, 1.0);
    }

    #[test]
    fn test_argument_validation() {
        let (_, tree) = grid_tree();
        let engine = tree.query(&EuclideanDistance);
        assert_eq!(engine.knn(&[0.0, 0.0], 0).unwrap_err(), SpatialError::InvalidK(0));
        assert!(matches!(engine.knn(&[0.0], 1), Err(SpatialError::DimensionMismatch { expected: 2, actual: 1 })));
        assert!(matches!(engine.knn(&[f64::NAN, 0.0], 1), Err(SpatialError::InvalidCoordinate { index: 0, .. })));
        assert!(matches!(engine.range(&[0.0, 0.0], -1.0), Err(SpatialError::InvalidRadius(_))));
        assert!(matches!(engine.range(&[0.0, 0.0], f64::NAN), Err(SpatialError::InvalidRadius(_))));
        assert!(engine.range(&[0.0, 0.0], 0.0).is_ok());
        assert!(engine.priority_search(&[0.0, 0.0, 0.0]).is_err());
        assert!(matches!(engine.knn_by_priority(&[0.0, 0.0], 0), Err(SpatialError::InvalidK(0))));
    }

    #[test]
    fn test_squared_engine_reports_true_distances() {
        let (_, tree) = grid_tree();
        let result = tree.knn(&[0.0, 0.0], 3, &EuclideanDistance).unwrap();
        assert_eq!(result[0].distance, 0.0);
        assert_eq!(result[1].distance, 1.0);
        assert_eq!(result[2].distance, 1.0);
        let squared = tree.knn(&[3.0, 4.0], 2, &SquaredEuclideanDistance).unwrap();
        assert_eq!(squared[0].distance, 0.0);
        let far = tree.query(&EuclideanDistance).range(&[0.0, 0.0], 5.0).unwrap();
        assert!(far.iter().any(|n| n.distance == 5.0), "3-4-5 point must be on the boundary");
    }

    #[test]
    fn test_queries_by_id() {
        let (relation, tree) = grid_tree();
        let engine = tree.query(&ManhattanDistance);
        let result = engine.knn_by_id(&relation, ObjectId(0), 3).unwrap();
        assert_eq!(result.ids(), vec![ObjectId(0), ObjectId(1), ObjectId(10)]);
        let near = engine.range_by_id(&relation, ObjectId(55), 1.0).unwrap();
        assert_eq!(near.len(), 5);
        let mut cursor = engine.priority_search_by_id(&relation, ObjectId(99)).unwrap();
        assert!(cursor.valid());
        assert_eq!(cursor.compute_exact_distance().map(|d| d <= 18.0), Some(true));
        assert_eq!(
            engine.knn_by_id(&relation, ObjectId(1000), 1).unwrap_err(),
            SpatialError::UnknownObject(ObjectId(1000))
        );
    }

    #[test]
    fn test_priority_consumers_agree_with_direct_queries() {
        let (_, tree) = grid_tree();
        for distance in [&EuclideanDistance as &dyn SpatialDistance, &ManhattanDistance] {
            let engine = tree.query(distance);
            for (query, k, radius) in [([2.5, 2.5], 4, 1.5), ([9.0, 0.0], 7, 2.0), ([-3.0, 12.0], 1, 5.0)] {
                assert_eq!(engine.knn(&query, k).unwrap().into_vec(), engine.knn_by_priority(&query, k).unwrap().into_vec());
                assert_eq!(
                    engine.range(&query, radius).unwrap().into_vec(),
                    engine.range_by_priority(&query, radius).unwrap().into_vec()
                );
            }
        }
    }
}
