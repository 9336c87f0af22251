use super::bits::{f64_to_key, key_to_f64};
use super::distance::{FloatKeyDistance, PhDimFilter};
use super::{PhNeighbor, PhTree};
use crate::distance::{SpatialDistance, check_distance_dimensionality};
use crate::error::{Result, SpatialError};

/// A stored point with its value and distance to a query point.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatNeighbor<'a, T> {
    /// The stored point.
    pub point: Vec<f64>,
    /// The stored value.
    pub value: &'a T,
    /// Distance to the query point.
    pub distance: f64,
}

impl<'a, T> From<PhNeighbor<'a, T>> for FloatNeighbor<'a, T> {
    fn from(neighbor: PhNeighbor<'a, T>) -> Self {
        Self { point: decode(neighbor.key), value: neighbor.value, distance: neighbor.distance }
    }
}

fn encode(point: &[f64]) -> Result<Vec<u64>> {
    SpatialError::check_coordinates(point)?;
    Ok(point.iter().map(|&v| f64_to_key(v)).collect())
}

fn decode(key: &[u64]) -> Vec<f64> {
    key.iter().map(|&k| key_to_f64(k)).collect()
}

/// A [`PhTree`] over `f64` points.
///
/// Points are stored through an order preserving encoding, so window
/// queries and distance bounds carry over. NaN coordinates are rejected.
///
/// # Example
///
/// ```
/// use spatial_knn::distance::EuclideanDistance;
/// use spatial_knn::phtree::PhTreeF;
///
/// let mut tree = PhTreeF::new(2).unwrap();
/// tree.put(&[0.5, -1.0], 1).unwrap();
/// tree.put(&[2.0, 2.0], 2).unwrap();
///
/// let nearest = tree.nearest_neighbor(1, &EuclideanDistance, None, &[0.0, 0.0]).unwrap();
/// assert_eq!(nearest[0].point, vec![0.5, -1.0]);
/// ```
#[derive(Debug, Clone)]
pub struct PhTreeF<T> {
    tree: PhTree<T>,
}

impl<T> PhTreeF<T> {
    /// Creates an empty tree.
    ///
    /// # Errors
    /// Same as [`PhTree::new`].
    pub fn new(dimensionality: usize) -> Result<Self> {
        Ok(Self { tree: PhTree::new(dimensionality)? })
    }

    /// The underlying tree over encoded keys.
    #[must_use]
    pub const fn inner(&self) -> &PhTree<T> {
        &self.tree
    }

    /// Number of dimensions of every point.
    #[must_use]
    pub const fn dimensionality(&self) -> usize {
        self.tree.dimensionality()
    }

    /// Number of stored entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    /// Whether the tree is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Number of trie nodes.
    #[must_use]
    pub const fn node_count(&self) -> usize {
        self.tree.node_count()
    }

    /// Stores `value` under `point` and returns the value it replaced.
    ///
    /// # Errors
    /// Returns [`SpatialError::InvalidCoordinate`] or
    /// [`SpatialError::DimensionMismatch`].
    pub fn put(&mut self, point: &[f64], value: T) -> Result<Option<T>> {
        self.tree.put(&encode(point)?, value)
    }

    /// The value stored under `point`.
    ///
    /// # Errors
    /// Same as [`PhTreeF::put`].
    pub fn get(&self, point: &[f64]) -> Result<Option<&T>> {
        self.tree.get(&encode(point)?)
    }

    /// Mutable access to the value stored under `point`.
    ///
    /// # Errors
    /// Same as [`PhTreeF::put`].
    pub fn get_mut(&mut self, point: &[f64]) -> Result<Option<&mut T>> {
        self.tree.get_mut(&encode(point)?)
    }

    /// Whether `point` is stored.
    ///
    /// # Errors
    /// Same as [`PhTreeF::put`].
    pub fn contains(&self, point: &[f64]) -> Result<bool> {
        self.tree.contains(&encode(point)?)
    }

    /// Removes `point` and returns its value.
    ///
    /// # Errors
    /// Same as [`PhTreeF::put`].
    pub fn remove(&mut self, point: &[f64]) -> Result<Option<T>> {
        self.tree.remove(&encode(point)?)
    }

    /// Moves the value stored under `old` to `new`; see [`PhTree::update`].
    ///
    /// # Errors
    /// Same as [`PhTreeF::put`], for either point.
    pub fn update(&mut self, old: &[f64], new: &[f64]) -> Result<Option<&mut T>> {
        let old = encode(old)?;
        let new = encode(new)?;
        self.tree.update(&old, &new)
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Entries inside the closed box `[min, max]`.
    ///
    /// # Errors
    /// Same as [`PhTreeF::put`], for either corner.
    pub fn query_window(&self, min: &[f64], max: &[f64]) -> Result<Vec<(Vec<f64>, &T)>> {
        let found = self.tree.query_window(&encode(min)?, &encode(max)?)?;
        Ok(found.into_iter().map(|(key, value)| (decode(key), value)).collect())
    }

    /// The `n_min` points closest to `point` under `distance`, closest
    /// first, extended by ties with the last one.
    ///
    /// # Errors
    /// Same as [`PhTreeF::put`], or [`SpatialError::DimensionMismatch`] for a
    /// filter or a distance of the wrong dimensionality.
    pub fn nearest_neighbor(
        &self,
        n_min: usize,
        distance: &dyn SpatialDistance,
        dims: Option<&PhDimFilter>,
        point: &[f64],
    ) -> Result<Vec<FloatNeighbor<'_, T>>> {
        let key = encode(point)?;
        check_distance_dimensionality(distance, self.dimensionality())?;
        let found = self.tree.nearest_neighbor(n_min, &FloatKeyDistance(distance), dims, &key)?;
        Ok(found.into_iter().map(FloatNeighbor::from).collect())
    }

    /// Every point within `radius` of `point` under `distance`, closest
    /// first.
    ///
    /// # Errors
    /// Same as [`PhTree::range`], or [`SpatialError::DimensionMismatch`] for
    /// a distance of the wrong dimensionality.
    pub fn range(&self, distance: &dyn SpatialDistance, point: &[f64], radius: f64) -> Result<Vec<FloatNeighbor<'_, T>>> {
        let key = encode(point)?;
        check_distance_dimensionality(distance, self.dimensionality())?;
        let found = self.tree.range(&FloatKeyDistance(distance), &key, radius)?;
        Ok(found.into_iter().map(FloatNeighbor::from).collect())
    }

    /// All entries with decoded points.
    pub fn iter(&self) -> impl Iterator<Item = (Vec<f64>, &T)> + '_ {
        self.tree.iter().map(|(key, value)| (decode(key), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{EuclideanDistance, ManhattanDistance, SquaredEuclideanDistance, WeightedEuclideanDistance};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_tree(seed: u64, n: usize, dim: usize) -> PhTreeF<usize> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut tree = PhTreeF::new(dim).unwrap();
        for i in 0..n {
            let point: Vec<f64> = (0..dim).map(|_| rng.random_range(-500.0..500.0)).collect();
            let _ = tree.put(&point, i).unwrap();
        }
        tree
    }

    // ========================================================================
    // Key handling
    // ========================================================================

    #[test]
    fn test_direct_hit() {
        let mut tree = PhTreeF::new(2).unwrap();
        for p in [[2.0, 2.0], [1.0, 1.0], [1.0, 3.0], [3.0, 1.0]] {
            let _ = tree.put(&p, p).unwrap();
        }
        assert!(tree.nearest_neighbor(0, &EuclideanDistance, None, &[3.0, 3.0]).unwrap().is_empty());
        for p in [[2.0, 2.0], [1.0, 1.0], [1.0, 3.0], [3.0, 1.0]] {
            let result = tree.nearest_neighbor(1, &EuclideanDistance, None, &p).unwrap();
            assert_eq!(result.len(), 1);
            assert_eq!(*result[0].value, p);
            assert_eq!(result[0].distance, 0.0);
        }
    }

    #[test]
    fn test_negative_and_signed_zero() {
        let mut tree = PhTreeF::new(1).unwrap();
        let _ = tree.put(&[-0.0], 'n').unwrap();
        let _ = tree.put(&[0.0], 'p').unwrap();
        let _ = tree.put(&[-3.5], 'm').unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.get(&[-3.5]).unwrap(), Some(&'m'));
        let window = tree.query_window(&[-4.0], &[-1.0]).unwrap();
        assert_eq!(window, vec![(vec![-3.5], &'m')]);
        assert!(matches!(tree.put(&[f64::NAN], 'x'), Err(SpatialError::InvalidCoordinate { .. })));
    }

    #[test]
    fn test_update_and_remove() {
        let mut tree = PhTreeF::new(2).unwrap();
        let _ = tree.put(&[1.0, 1.0], 7).unwrap();
        *tree.update(&[1.0, 1.0], &[-1.0, 2.0]).unwrap().unwrap() += 1;
        assert_eq!(tree.get(&[-1.0, 2.0]).unwrap(), Some(&8));
        assert!(!tree.contains(&[1.0, 1.0]).unwrap());
        assert_eq!(tree.remove(&[-1.0, 2.0]).unwrap(), Some(8));
        assert!(tree.is_empty());
    }

    // ========================================================================
    // Queries against a linear scan
    // ========================================================================

    #[test]
    fn test_knn_matches_scan() {
        let tree = random_tree(7, 1000, 3);
        let mut rng = StdRng::seed_from_u64(8);
        for distance in [&EuclideanDistance as &dyn SpatialDistance, &ManhattanDistance, &SquaredEuclideanDistance] {
            for _ in 0..10 {
                let query: Vec<f64> = (0..3).map(|_| rng.random_range(-600.0..600.0)).collect();
                let mut scan: Vec<f64> = tree.iter().map(|(p, _)| distance.distance(&query, &p)).collect();
                scan.sort_by(f64::total_cmp);
                let result = tree.nearest_neighbor(10, distance, None, &query).unwrap();
                let found: Vec<f64> = result.iter().take(10).map(|n| n.distance).collect();
                assert_eq!(found, scan[..10].to_vec(), "{} disagrees with a scan", distance.name());
            }
        }
    }

    #[test]
    fn test_range_matches_scan() {
        let tree = random_tree(9, 800, 2);
        let query = [10.0, -20.0];
        let radius = 120.0;
        let expected = tree.iter().filter(|(p, _)| EuclideanDistance.distance(&query, p) <= radius).count();
        let result = tree.range(&EuclideanDistance, &query, radius).unwrap();
        assert_eq!(result.len(), expected);
        assert!(result.iter().all(|n| n.distance <= radius));
    }

    #[test]
    fn test_window_matches_scan() {
        let tree = random_tree(10, 800, 2);
        let (min, max) = ([-100.0, 0.0], [50.0, 250.0]);
        let expected =
            tree.iter().filter(|(p, _)| (0..2).all(|d| min[d] <= p[d] && p[d] <= max[d])).count();
        assert_eq!(tree.query_window(&min, &max).unwrap().len(), expected);
    }

    #[test]
    fn test_filter_with_weighted_distance() {
        let mut tree = PhTreeF::new(2).unwrap();
        for (p, v) in [([0.0, 1.0], 'a'), ([0.0, 5.0], 'b'), ([30.0, 0.5], 'c')] {
            let _ = tree.put(&p, v).unwrap();
        }
        let weighted = WeightedEuclideanDistance::new(vec![1.0, 100.0]).unwrap();
        let y_only = PhDimFilter::only(2, &[1]).unwrap();
        let result = tree.nearest_neighbor(2, &weighted, Some(&y_only), &[0.0, 0.0]).unwrap();
        let found: Vec<(char, f64)> = result.iter().map(|n| (*n.value, n.distance)).collect();
        assert_eq!(found, vec![('c', 5.0), ('a', 10.0)], "x is ignored and y keeps its weight");
    }

    #[test]
    fn test_distance_dimensionality_is_checked() {
        let tree = random_tree(11, 50, 3);
        let weighted = WeightedEuclideanDistance::new(vec![1.0, 1.0]).unwrap();
        let mismatch = SpatialError::DimensionMismatch { expected: 3, actual: 2 };
        assert_eq!(tree.nearest_neighbor(2, &weighted, None, &[0.0, 0.0, 0.0]).unwrap_err(), mismatch);
        assert_eq!(tree.range(&weighted, &[0.0, 0.0, 0.0], 10.0).unwrap_err(), mismatch);
        let fitting = WeightedEuclideanDistance::new(vec![1.0, 1.0, 1.0]).unwrap();
        assert_eq!(tree.nearest_neighbor(2, &fitting, None, &[0.0, 0.0, 0.0]).unwrap().len(), 2);
    }
}
