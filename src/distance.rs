//! Distance functions with lower bounds for spatial pruning.
//!
//! Every [`SpatialDistance`] provides an exact point-to-point distance and a
//! lower bound from a point (or box) to any point inside a box. Search
//! correctness depends on one contract only:
//!
//! `min_dist(p, B) <= distance(p, q)` for every `q` inside `B`.
//!
//! The triangle inequality is not required.

use std::any::Any;
use std::fmt;

use crate::error::{Result, SpatialError};
use crate::geometry::{BoundingBox, axis_distance, interval_gap};

/// Identifies distance functions that have specialized query paths.
///
/// Derived from the concrete type by [`metric_kind`], so an implementation
/// cannot claim a specialized path for itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum MetricKind {
    /// The canonical [`EuclideanDistance`].
    Euclidean,
    /// The canonical [`SquaredEuclideanDistance`].
    SquaredEuclidean,
    /// Anything else; served by the generic query engine.
    Other,
}

/// A distance function usable for spatial branch-and-bound search.
pub trait SpatialDistance: Any + fmt::Debug + Send + Sync {
    /// Exact distance between two points of equal dimensionality.
    fn distance(&self, a: &[f64], b: &[f64]) -> f64;

    /// Lower bound on the distance from `point` to any point in `mbr`.
    ///
    /// Must be 0 when `point` lies inside `mbr`.
    fn min_dist(&self, point: &[f64], mbr: &BoundingBox) -> f64;

    /// Lower bound on the distance between any two points of the boxes.
    fn min_dist_box(&self, a: &BoundingBox, b: &BoundingBox) -> f64;

    /// Whether the triangle inequality holds.
    fn is_metric(&self) -> bool;

    /// Whether reported values are squared distances.
    fn is_squared(&self) -> bool {
        false
    }

    /// Number of dimensions the function is defined for, if it is bound to
    /// one. Queries reject a tree of any other dimensionality.
    fn dimensionality(&self) -> Option<usize> {
        None
    }

    /// Short human readable name, used in logs.
    fn name(&self) -> &str;
}

/// Which specialized query path, if any, applies to `distance`.
///
/// Only the canonical types qualify; a wrapper or user type computing the same
/// values is [`MetricKind::Other`].
#[must_use]
pub fn metric_kind(distance: &dyn SpatialDistance) -> MetricKind {
    let any = distance as &dyn Any;
    if any.is::<EuclideanDistance>() {
        MetricKind::Euclidean
    } else if any.is::<SquaredEuclideanDistance>() {
        MetricKind::SquaredEuclidean
    } else {
        MetricKind::Other
    }
}

/// Fails with [`SpatialError::DimensionMismatch`] when `distance` is bound to
/// a dimensionality other than `expected`.
pub(crate) fn check_distance_dimensionality(distance: &dyn SpatialDistance, expected: usize) -> Result<()> {
    match distance.dimensionality() {
        Some(actual) => SpatialError::check_dimension(expected, actual),
        None => Ok(()),
    }
}

/// Per-dimension gaps from a point to a box, fed to an accumulator.
#[inline]
fn point_gaps<'a>(point: &'a [f64], mbr: &'a BoundingBox) -> impl Iterator<Item = f64> + 'a {
    debug_assert_eq!(point.len(), mbr.dimensionality(), "dimension mismatch");
    point
        .iter()
        .zip(mbr.lo().iter().zip(mbr.hi().iter()))
        .map(|(&p, (&lo, &hi))| axis_distance(p, lo, hi))
}

#[inline]
fn box_gaps<'a>(a: &'a BoundingBox, b: &'a BoundingBox) -> impl Iterator<Item = f64> + 'a {
    debug_assert_eq!(a.dimensionality(), b.dimensionality(), "dimension mismatch");
    (0..a.dimensionality()).map(move |d| interval_gap(a.lo()[d], a.hi()[d], b.lo()[d], b.hi()[d]))
}

#[inline]
fn point_deltas<'a>(a: &'a [f64], b: &'a [f64]) -> impl Iterator<Item = f64> + 'a {
    debug_assert_eq!(a.len(), b.len(), "dimension mismatch");
    a.iter().zip(b).map(|(x, y)| (x - y).abs())
}

/// Squared Euclidean distance between two points.
#[inline]
#[must_use]
pub fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "dimension mismatch");
    let mut sum = 0.0;
    for (x, y) in a.iter().zip(b) {
        let delta = x - y;
        sum += delta * delta;
    }
    sum
}

/// Euclidean (L2) distance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EuclideanDistance;

impl SpatialDistance for EuclideanDistance {
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        squared_euclidean(a, b).sqrt()
    }

    fn min_dist(&self, point: &[f64], mbr: &BoundingBox) -> f64 {
        mbr.min_dist_squared(point).sqrt()
    }

    fn min_dist_box(&self, a: &BoundingBox, b: &BoundingBox) -> f64 {
        a.min_dist_squared_box(b).sqrt()
    }

    fn is_metric(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "euclidean"
    }
}

/// Squared Euclidean distance; not a metric, but a valid spatial primitive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SquaredEuclideanDistance;

impl SpatialDistance for SquaredEuclideanDistance {
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        squared_euclidean(a, b)
    }

    fn min_dist(&self, point: &[f64], mbr: &BoundingBox) -> f64 {
        mbr.min_dist_squared(point)
    }

    fn min_dist_box(&self, a: &BoundingBox, b: &BoundingBox) -> f64 {
        a.min_dist_squared_box(b)
    }

    fn is_metric(&self) -> bool {
        false
    }

    fn is_squared(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "squared-euclidean"
    }
}

/// Manhattan (L1) distance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ManhattanDistance;

impl SpatialDistance for ManhattanDistance {
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        point_deltas(a, b).sum()
    }

    fn min_dist(&self, point: &[f64], mbr: &BoundingBox) -> f64 {
        point_gaps(point, mbr).sum()
    }

    fn min_dist_box(&self, a: &BoundingBox, b: &BoundingBox) -> f64 {
        box_gaps(a, b).sum()
    }

    fn is_metric(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "manhattan"
    }
}

/// Maximum (Chebyshev, L-infinity) distance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaximumDistance;

impl SpatialDistance for MaximumDistance {
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        point_deltas(a, b).fold(0.0, f64::max)
    }

    fn min_dist(&self, point: &[f64], mbr: &BoundingBox) -> f64 {
        point_gaps(point, mbr).fold(0.0, f64::max)
    }

    fn min_dist_box(&self, a: &BoundingBox, b: &BoundingBox) -> f64 {
        box_gaps(a, b).fold(0.0, f64::max)
    }

    fn is_metric(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "maximum"
    }
}

/// Minkowski (Lp) distance for any `p > 0`.
///
/// For `p < 1` the triangle inequality does not hold, but the box lower
/// bound is still valid because every term is monotone in its gap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinkowskiDistance {
    p: f64,
    inv_p: f64,
}

impl MinkowskiDistance {
    /// Creates an Lp distance.
    ///
    /// # Errors
    /// Returns [`SpatialError::InvalidParameter`] unless `p` is finite and
    /// strictly positive.
    pub fn new(p: f64) -> Result<Self> {
        if !(p.is_finite() && p > 0.0) {
            return Err(SpatialError::InvalidParameter {
                name: "p",
                reason: format!("must be finite and positive, got {p}"),
            });
        }
        Ok(Self { p, inv_p: 1.0 / p })
    }

    /// The exponent.
    #[must_use]
    pub const fn p(&self) -> f64 {
        self.p
    }

    #[inline]
    fn combine(&self, gaps: impl Iterator<Item = f64>) -> f64 {
        gaps.map(|g| g.powf(self.p)).sum::<f64>().powf(self.inv_p)
    }
}

impl SpatialDistance for MinkowskiDistance {
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        self.combine(point_deltas(a, b))
    }

    fn min_dist(&self, point: &[f64], mbr: &BoundingBox) -> f64 {
        self.combine(point_gaps(point, mbr))
    }

    fn min_dist_box(&self, a: &BoundingBox, b: &BoundingBox) -> f64 {
        self.combine(box_gaps(a, b))
    }

    fn is_metric(&self) -> bool {
        self.p >= 1.0
    }

    fn name(&self) -> &str {
        "minkowski"
    }
}

/// Euclidean distance with non-negative per-dimension weights.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightedEuclideanDistance {
    weights: Box<[f64]>,
}

impl WeightedEuclideanDistance {
    /// Creates a weighted Euclidean distance.
    ///
    /// # Errors
    /// Returns [`SpatialError::InvalidParameter`] for empty, negative or
    /// non-finite weights.
    pub fn new(weights: Vec<f64>) -> Result<Self> {
        if weights.is_empty() {
            return Err(SpatialError::InvalidParameter { name: "weights", reason: "empty".into() });
        }
        if let Some(w) = weights.iter().find(|w| !(w.is_finite() && **w >= 0.0)) {
            return Err(SpatialError::InvalidParameter {
                name: "weights",
                reason: format!("must be finite and non-negative, got {w}"),
            });
        }
        Ok(Self { weights: weights.into_boxed_slice() })
    }

    /// The weight vector.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    #[inline]
    fn combine(&self, gaps: impl Iterator<Item = f64>) -> f64 {
        gaps.zip(self.weights.iter()).map(|(g, w)| w * g * g).sum::<f64>().sqrt()
    }
}

impl SpatialDistance for WeightedEuclideanDistance {
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        debug_assert_eq!(a.len(), self.weights.len(), "dimension mismatch");
        self.combine(point_deltas(a, b))
    }

    fn min_dist(&self, point: &[f64], mbr: &BoundingBox) -> f64 {
        self.combine(point_gaps(point, mbr))
    }

    fn min_dist_box(&self, a: &BoundingBox, b: &BoundingBox) -> f64 {
        self.combine(box_gaps(a, b))
    }

    fn is_metric(&self) -> bool {
        true
    }

    fn dimensionality(&self) -> Option<usize> {
        Some(self.weights.len())
    }

    fn name(&self) -> &str {
        "weighted-euclidean"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn all_distances() -> Vec<Box<dyn SpatialDistance>> {
        vec![
            Box::new(EuclideanDistance),
            Box::new(SquaredEuclideanDistance),
            Box::new(ManhattanDistance),
            Box::new(MaximumDistance),
            Box::new(MinkowskiDistance::new(3.0).unwrap()),
            Box::new(MinkowskiDistance::new(0.5).unwrap()),
            Box::new(WeightedEuclideanDistance::new(vec![1.0, 2.0, 0.5]).unwrap()),
        ]
    }

    #[test]
    fn test_known_values() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        assert_relative_eq!(EuclideanDistance.distance(&a, &b), 5.0);
        assert_relative_eq!(SquaredEuclideanDistance.distance(&a, &b), 25.0);
        assert_relative_eq!(ManhattanDistance.distance(&a, &b), 7.0);
        assert_relative_eq!(MaximumDistance.distance(&a, &b), 4.0);
        assert_relative_eq!(MinkowskiDistance::new(2.0).unwrap().distance(&a, &b), 5.0, epsilon = 1e-12);
        assert_relative_eq!(MinkowskiDistance::new(1.0).unwrap().distance(&a, &b), 7.0, epsilon = 1e-12);
    }

    #[test]
    fn test_weighted() {
        let d = WeightedEuclideanDistance::new(vec![4.0, 0.0]).unwrap();
        assert_relative_eq!(d.distance(&[0.0, 0.0], &[1.0, 100.0]), 2.0);
    }

    #[test]
    fn test_zero_at_containment() {
        let mbr = BoundingBox::new(vec![0.0, 0.0, 0.0], vec![1.0, 2.0, 3.0]).unwrap();
        for dist in all_distances() {
            assert_eq!(dist.min_dist(&[0.5, 1.0, 3.0], &mbr), 0.0, "{}", dist.name());
        }
    }

    #[test]
    fn test_lower_bound_on_corner() {
        let mbr = BoundingBox::new(vec![1.0, 1.0, 1.0], vec![2.0, 2.0, 2.0]).unwrap();
        let query = [0.0, -1.0, 5.0];
        let corner = [1.0, 1.0, 2.0];
        for dist in all_distances() {
            let bound = dist.min_dist(&query, &mbr);
            let exact = dist.distance(&query, &corner);
            assert!(bound <= exact + 1e-12, "{}: {bound} > {exact}", dist.name());
            // the nearest corner realizes the bound
            assert_relative_eq!(bound, exact, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_box_lower_bound() {
        let a = BoundingBox::new(vec![0.0, 0.0, 0.0], vec![1.0, 1.0, 1.0]).unwrap();
        let b = BoundingBox::new(vec![3.0, 0.5, 1.0], vec![4.0, 2.0, 2.0]).unwrap();
        for dist in all_distances() {
            let bound = dist.min_dist_box(&a, &b);
            let exact = dist.distance(&[1.0, 0.5, 1.0], &[3.0, 0.5, 1.0]);
            assert!(bound <= exact + 1e-12, "{}", dist.name());
        }
    }

    #[test]
    fn test_markers() {
        assert!(EuclideanDistance.is_metric());
        assert!(!SquaredEuclideanDistance.is_metric());
        assert!(SquaredEuclideanDistance.is_squared());
        assert!(!MinkowskiDistance::new(0.5).unwrap().is_metric());
        assert_eq!(metric_kind(&EuclideanDistance), MetricKind::Euclidean);
        assert_eq!(metric_kind(&SquaredEuclideanDistance), MetricKind::SquaredEuclidean);
        assert_eq!(metric_kind(&ManhattanDistance), MetricKind::Other);
        // weighted Euclidean with unit weights is Euclidean-like, not canonical
        assert_eq!(metric_kind(&WeightedEuclideanDistance::new(vec![1.0]).unwrap()), MetricKind::Other);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(MinkowskiDistance::new(0.0).is_err());
        assert!(MinkowskiDistance::new(f64::INFINITY).is_err());
        assert!(WeightedEuclideanDistance::new(vec![]).is_err());
        assert!(WeightedEuclideanDistance::new(vec![1.0, -1.0]).is_err());
    }
}
