//! Distance functions on PH-tree keys.

use super::bits::key_to_f64;
use crate::distance::SpatialDistance;
use crate::error::{Result, SpatialError};
use crate::geometry::BoundingBox;

/// Selects the dimensions a nearest neighbor search takes into account.
///
/// Ignored dimensions contribute nothing to distances or bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhDimFilter {
    mask: Vec<bool>,
}

impl PhDimFilter {
    /// Every one of `dimensionality` dimensions.
    #[must_use]
    pub fn all(dimensionality: usize) -> Self {
        Self { mask: vec![true; dimensionality] }
    }

    /// Only the listed dimensions of `dimensionality`.
    ///
    /// # Errors
    /// Returns [`SpatialError::InvalidParameter`] for an out of range or
    /// empty selection.
    pub fn only(dimensionality: usize, dimensions: &[usize]) -> Result<Self> {
        let mut mask = vec![false; dimensionality];
        for &d in dimensions {
            let slot = mask.get_mut(d).ok_or_else(|| SpatialError::InvalidParameter {
                name: "dimensions",
                reason: format!("dimension {d} out of range for {dimensionality}"),
            })?;
            *slot = true;
        }
        if dimensions.is_empty() {
            return Err(SpatialError::InvalidParameter { name: "dimensions", reason: "no dimension selected".into() });
        }
        Ok(Self { mask })
    }

    /// Number of dimensions the filter applies to.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.mask.len()
    }

    /// Whether dimension `d` is taken into account.
    #[must_use]
    pub fn includes(&self, d: usize) -> bool {
        self.mask.get(d).copied().unwrap_or(false)
    }

    /// Indices of the selected dimensions.
    pub fn dimensions(&self) -> impl Iterator<Item = usize> + '_ {
        self.mask.iter().enumerate().filter(|(_, on)| **on).map(|(d, _)| d)
    }
}

/// A distance on PH-tree keys with a lower bound for key regions.
///
/// Values only need to be ordered consistently with the real distance;
/// squared distances are valid and avoid square roots.
pub trait PhDistance {
    /// Distance between two keys over the selected dimensions.
    fn distance(&self, a: &[u64], b: &[u64], dims: &PhDimFilter) -> f64;

    /// Lower bound on the distance from `key` to any key in the region
    /// `[lo, hi]`; 0 when `key` lies inside it.
    fn min_dist(&self, key: &[u64], lo: &[u64], hi: &[u64], dims: &PhDimFilter) -> f64;
}

#[inline]
fn key_gap(key: u64, lo: u64, hi: u64) -> u64 {
    if key < lo {
        lo - key
    } else if key > hi {
        key - hi
    } else {
        0
    }
}

/// Keys above 2^53 apart lose precision in the `f64` result.
fn squared_key_distance(a: &[u64], b: &[u64], dims: &PhDimFilter) -> f64 {
    dims.dimensions()
        .map(|d| {
            let delta = a[d].abs_diff(b[d]) as f64;
            delta * delta
        })
        .sum()
}

fn squared_key_gap(key: &[u64], lo: &[u64], hi: &[u64], dims: &PhDimFilter) -> f64 {
    dims.dimensions()
        .map(|d| {
            let gap = key_gap(key[d], lo[d], hi[d]) as f64;
            gap * gap
        })
        .sum()
}

/// Euclidean distance between keys read as unsigned integers.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyEuclidean;

impl PhDistance for KeyEuclidean {
    fn distance(&self, a: &[u64], b: &[u64], dims: &PhDimFilter) -> f64 {
        squared_key_distance(a, b, dims).sqrt()
    }

    fn min_dist(&self, key: &[u64], lo: &[u64], hi: &[u64], dims: &PhDimFilter) -> f64 {
        squared_key_gap(key, lo, hi, dims).sqrt()
    }
}

/// Squared Euclidean distance between keys read as unsigned integers.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeySquaredEuclidean;

impl PhDistance for KeySquaredEuclidean {
    fn distance(&self, a: &[u64], b: &[u64], dims: &PhDimFilter) -> f64 {
        squared_key_distance(a, b, dims)
    }

    fn min_dist(&self, key: &[u64], lo: &[u64], hi: &[u64], dims: &PhDimFilter) -> f64 {
        squared_key_gap(key, lo, hi, dims)
    }
}

/// Evaluates a [`SpatialDistance`] on keys holding encoded `f64` values.
///
/// Key regions decode to boxes because the encoding preserves order. Points
/// keep every dimension so per-dimension parameters line up; a dimension the
/// filter ignores takes the coordinate of the first key (the query), which
/// makes its contribution 0.
#[derive(Debug, Clone, Copy)]
pub struct FloatKeyDistance<'a>(pub &'a dyn SpatialDistance);

impl FloatKeyDistance<'_> {
    /// Decodes `key`, replacing ignored dimensions with `anchor`'s.
    fn decode(key: &[u64], anchor: &[u64], dims: &PhDimFilter) -> Vec<f64> {
        key.iter()
            .zip(anchor)
            .enumerate()
            .map(|(d, (&k, &a))| key_to_f64(if dims.includes(d) { k } else { a }))
            .collect()
    }
}

impl PhDistance for FloatKeyDistance<'_> {
    fn distance(&self, a: &[u64], b: &[u64], dims: &PhDimFilter) -> f64 {
        self.0.distance(&Self::decode(a, a, dims), &Self::decode(b, a, dims))
    }

    fn min_dist(&self, key: &[u64], lo: &[u64], hi: &[u64], dims: &PhDimFilter) -> f64 {
        let mut low = Self::decode(lo, key, dims);
        let mut high = Self::decode(hi, key, dims);
        // regions may span encodings of NaN, which bound nothing
        for (l, h) in low.iter_mut().zip(high.iter_mut()) {
            if l.is_nan() {
                *l = f64::NEG_INFINITY;
            }
            if h.is_nan() {
                *h = f64::INFINITY;
            }
        }
        match BoundingBox::new(low, high) {
            Ok(region) => self.0.min_dist(&Self::decode(key, key, dims), &region),
            Err(_) => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{EuclideanDistance, ManhattanDistance, WeightedEuclideanDistance};
    use crate::phtree::bits::f64_to_key;
    use approx::assert_relative_eq;

    #[test]
    fn test_filter() {
        let filter = PhDimFilter::only(3, &[0, 2]).unwrap();
        assert_eq!(filter.dimensions().collect::<Vec<_>>(), vec![0, 2]);
        assert!(!filter.includes(1));
        assert!(PhDimFilter::only(3, &[3]).is_err());
        assert!(PhDimFilter::only(3, &[]).is_err());
        assert_eq!(PhDimFilter::all(4).dimensions().count(), 4);
    }

    #[test]
    fn test_key_distances() {
        let all = PhDimFilter::all(2);
        assert_eq!(KeyEuclidean.distance(&[0, 0], &[3, 4], &all), 5.0);
        assert_eq!(KeySquaredEuclidean.distance(&[0, 0], &[3, 4], &all), 25.0);
        assert_eq!(KeyEuclidean.min_dist(&[5, 5], &[0, 0], &[10, 10], &all), 0.0);
        assert_eq!(KeySquaredEuclidean.min_dist(&[0, 12], &[2, 2], &[10, 10], &all), 8.0);
        let x_only = PhDimFilter::only(2, &[0]).unwrap();
        assert_eq!(KeyEuclidean.distance(&[0, 0], &[3, 4], &x_only), 3.0);
    }

    #[test]
    fn test_float_adapter() {
        let all = PhDimFilter::all(2);
        let a = [f64_to_key(-1.0), f64_to_key(0.5)];
        let b = [f64_to_key(2.0), f64_to_key(4.5)];
        assert_relative_eq!(FloatKeyDistance(&EuclideanDistance).distance(&a, &b, &all), 5.0);
        assert_relative_eq!(FloatKeyDistance(&ManhattanDistance).distance(&a, &b, &all), 7.0);

        let lo = [f64_to_key(1.0), f64_to_key(1.0)];
        let hi = [f64_to_key(2.0), f64_to_key(2.0)];
        let bound = FloatKeyDistance(&ManhattanDistance).min_dist(&a, &lo, &hi, &all);
        assert_relative_eq!(bound, 2.5);
        // a region covering the whole key space bounds nothing
        assert_eq!(FloatKeyDistance(&EuclideanDistance).min_dist(&a, &[0, 0], &[u64::MAX, u64::MAX], &all), 0.0);
    }

    #[test]
    fn test_float_adapter_keeps_dimension_positions() {
        let weighted = WeightedEuclideanDistance::new(vec![1.0, 100.0]).unwrap();
        let y_only = PhDimFilter::only(2, &[1]).unwrap();
        let query = [f64_to_key(0.0), f64_to_key(0.0)];
        let stored = [f64_to_key(7.0), f64_to_key(1.0)];
        // the ignored x gap of 7 drops out, y keeps its weight of 100
        assert_relative_eq!(FloatKeyDistance(&weighted).distance(&query, &stored, &y_only), 10.0);

        let lo = [f64_to_key(5.0), f64_to_key(2.0)];
        let hi = [f64_to_key(6.0), f64_to_key(3.0)];
        assert_relative_eq!(FloatKeyDistance(&weighted).min_dist(&query, &lo, &hi, &y_only), 20.0);
        let x_only = PhDimFilter::only(2, &[0]).unwrap();
        assert_relative_eq!(FloatKeyDistance(&weighted).min_dist(&query, &lo, &hi, &x_only), 5.0);
    }
}
