//! Axis-aligned bounding boxes and the distance primitives built on them.
//!
//! Points are plain `&[f64]` slices. A [`BoundingBox`] is the closed
//! hyper-rectangle `[lo, hi]`; a box with `lo == hi` represents a point.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpatialError};

/// Anything with an axis-aligned extent, used by the split and bulk-load
/// code to treat points, boxes and node entries uniformly.
pub trait SpatialComparable {
    /// Number of dimensions.
    fn dimensionality(&self) -> usize;

    /// Lower bound in dimension `d`.
    fn min(&self, d: usize) -> f64;

    /// Upper bound in dimension `d`.
    fn max(&self, d: usize) -> f64;

    /// Center coordinate in dimension `d`.
    fn center(&self, d: usize) -> f64 {
        (self.min(d) + self.max(d)) * 0.5
    }
}

impl<T: SpatialComparable + ?Sized> SpatialComparable for &T {
    fn dimensionality(&self) -> usize {
        (**self).dimensionality()
    }

    fn min(&self, d: usize) -> f64 {
        (**self).min(d)
    }

    fn max(&self, d: usize) -> f64 {
        (**self).max(d)
    }
}

impl SpatialComparable for [f64] {
    fn dimensionality(&self) -> usize {
        self.len()
    }

    fn min(&self, d: usize) -> f64 {
        self[d]
    }

    fn max(&self, d: usize) -> f64 {
        self[d]
    }
}

/// Closed axis-aligned hyper-rectangle.
///
/// Invariant: `lo.len() == hi.len()` and `lo[d] <= hi[d]` for every `d`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    lo: Box<[f64]>,
    hi: Box<[f64]>,
}

impl BoundingBox {
    /// Creates a box from its lower and upper corners.
    ///
    /// # Errors
    /// Returns [`SpatialError::DimensionMismatch`] if the corners differ in
    /// length and [`SpatialError::InvalidBoundingBox`] if `lo[d] > hi[d]` or a
    /// coordinate is NaN.
    pub fn new(lo: Vec<f64>, hi: Vec<f64>) -> Result<Self> {
        SpatialError::check_dimension(lo.len(), hi.len())?;
        for (dimension, (&l, &h)) in lo.iter().zip(&hi).enumerate() {
            // `!(l <= h)` also catches NaN.
            if !(l <= h) {
                return Err(SpatialError::InvalidBoundingBox { dimension, lo: l, hi: h });
            }
        }
        Ok(Self { lo: lo.into_boxed_slice(), hi: hi.into_boxed_slice() })
    }

    /// Degenerate box covering exactly `point`.
    #[must_use]
    pub fn from_point(point: &[f64]) -> Self {
        Self { lo: point.into(), hi: point.into() }
    }

    /// Box spanning the extent of a single item.
    #[must_use]
    pub fn of<T: SpatialComparable + ?Sized>(item: &T) -> Self {
        let dim = item.dimensionality();
        Self {
            lo: (0..dim).map(|d| item.min(d)).collect(),
            hi: (0..dim).map(|d| item.max(d)).collect(),
        }
    }

    /// Minimal box covering every item; `None` for an empty iterator.
    pub fn covering<'a, T, I>(items: I) -> Option<Self>
    where
        T: SpatialComparable + ?Sized + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let mut iter = items.into_iter();
        let first = iter.next()?;
        let dim = first.dimensionality();
        let mut lo: Vec<f64> = (0..dim).map(|d| first.min(d)).collect();
        let mut hi: Vec<f64> = (0..dim).map(|d| first.max(d)).collect();
        for item in iter {
            for d in 0..dim {
                lo[d] = lo[d].min(item.min(d));
                hi[d] = hi[d].max(item.max(d));
            }
        }
        Some(Self { lo: lo.into_boxed_slice(), hi: hi.into_boxed_slice() })
    }

    /// Number of dimensions.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.lo.len()
    }

    /// Lower corner.
    #[must_use]
    pub fn lo(&self) -> &[f64] {
        &self.lo
    }

    /// Upper corner.
    #[must_use]
    pub fn hi(&self) -> &[f64] {
        &self.hi
    }

    /// Grows the box to cover `other`. Returns whether it changed.
    pub fn extend<T: SpatialComparable + ?Sized>(&mut self, other: &T) -> bool {
        debug_assert_eq!(self.dimensionality(), other.dimensionality(), "dimension mismatch");
        let mut changed = false;
        for d in 0..self.lo.len() {
            if other.min(d) < self.lo[d] {
                self.lo[d] = other.min(d);
                changed = true;
            }
            if other.max(d) > self.hi[d] {
                self.hi[d] = other.max(d);
                changed = true;
            }
        }
        changed
    }

    /// Smallest box covering both `self` and `other`.
    #[must_use]
    pub fn union<T: SpatialComparable + ?Sized>(&self, other: &T) -> Self {
        let mut result = self.clone();
        let _ = result.extend(other);
        result
    }

    /// Whether `point` lies inside the closed box.
    #[must_use]
    pub fn contains_point(&self, point: &[f64]) -> bool {
        debug_assert_eq!(self.dimensionality(), point.len(), "dimension mismatch");
        point.iter().zip(self.lo.iter().zip(self.hi.iter())).all(|(&p, (&l, &h))| l <= p && p <= h)
    }

    /// Whether `other` lies completely inside this box.
    #[must_use]
    pub fn contains<T: SpatialComparable + ?Sized>(&self, other: &T) -> bool {
        (0..self.dimensionality()).all(|d| self.lo[d] <= other.min(d) && other.max(d) <= self.hi[d])
    }

    /// Whether the two closed boxes share at least one point.
    #[must_use]
    pub fn intersects<T: SpatialComparable + ?Sized>(&self, other: &T) -> bool {
        (0..self.dimensionality()).all(|d| self.lo[d] <= other.max(d) && other.min(d) <= self.hi[d])
    }

    /// Hyper-volume (product of side lengths).
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.lo.iter().zip(self.hi.iter()).map(|(l, h)| h - l).product()
    }

    /// Margin: the sum of side lengths, proportional to the perimeter.
    #[must_use]
    pub fn margin(&self) -> f64 {
        self.lo.iter().zip(self.hi.iter()).map(|(l, h)| h - l).sum()
    }

    /// Volume of the intersection with `other`, 0 when disjoint.
    #[must_use]
    pub fn overlap(&self, other: &Self) -> f64 {
        let mut volume = 1.0;
        for d in 0..self.dimensionality() {
            let side = self.hi[d].min(other.hi[d]) - self.lo[d].max(other.lo[d]);
            if side <= 0.0 {
                return 0.0;
            }
            volume *= side;
        }
        volume
    }

    /// Volume increase needed to also cover `other`.
    #[must_use]
    pub fn enlargement<T: SpatialComparable + ?Sized>(&self, other: &T) -> f64 {
        self.union(other).volume() - self.volume()
    }

    /// Center point.
    #[must_use]
    pub fn centroid(&self) -> Vec<f64> {
        self.lo.iter().zip(self.hi.iter()).map(|(l, h)| (l + h) * 0.5).collect()
    }

    /// Squared Euclidean lower bound from `point` to any point in the box.
    ///
    /// Dimensions where the point lies within `[lo, hi]` contribute nothing.
    #[must_use]
    pub fn min_dist_squared(&self, point: &[f64]) -> f64 {
        debug_assert_eq!(self.dimensionality(), point.len(), "dimension mismatch");
        let mut sum = 0.0;
        for d in 0..point.len() {
            let delta = axis_distance(point[d], self.lo[d], self.hi[d]);
            sum += delta * delta;
        }
        sum
    }

    /// Euclidean lower bound from `point` to any point in the box.
    #[must_use]
    pub fn min_dist(&self, point: &[f64]) -> f64 {
        self.min_dist_squared(point).sqrt()
    }

    /// Squared Euclidean lower bound between any two points of the boxes.
    #[must_use]
    pub fn min_dist_squared_box(&self, other: &Self) -> f64 {
        debug_assert_eq!(self.dimensionality(), other.dimensionality(), "dimension mismatch");
        let mut sum = 0.0;
        for d in 0..self.dimensionality() {
            let delta = interval_gap(self.lo[d], self.hi[d], other.lo[d], other.hi[d]);
            sum += delta * delta;
        }
        sum
    }
}

impl SpatialComparable for BoundingBox {
    fn dimensionality(&self) -> usize {
        self.lo.len()
    }

    fn min(&self, d: usize) -> f64 {
        self.lo[d]
    }

    fn max(&self, d: usize) -> f64 {
        self.hi[d]
    }
}

/// Distance from `coordinate` to the interval `[min, max]` along one axis.
#[inline]
pub(crate) fn axis_distance(coordinate: f64, min: f64, max: f64) -> f64 {
    if coordinate < min {
        min - coordinate
    } else if coordinate > max {
        coordinate - max
    } else {
        0.0
    }
}

/// Gap between the intervals `[lo1, hi1]` and `[lo2, hi2]`, 0 if they overlap.
#[inline]
pub(crate) fn interval_gap(lo1: f64, hi1: f64, lo2: f64, hi2: f64) -> f64 {
    if hi1 < lo2 {
        lo2 - hi1
    } else if hi2 < lo1 {
        lo1 - hi2
    } else {
        0.0
    }
}
