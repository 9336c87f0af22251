//! Object identifiers and the point accessor used for queries by identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpatialError};

/// Opaque, stable identifier of an indexed object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for ObjectId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Resolves object identifiers to their coordinates.
///
/// Indexes store their own copy of each point; the accessor is only
/// consulted when a query is expressed by identifier.
pub trait PointAccessor {
    /// Dimensionality of all stored points.
    fn dimensionality(&self) -> usize;

    /// Coordinates of `id`, if it is known.
    fn point(&self, id: ObjectId) -> Option<&[f64]>;

    /// Coordinates of `id`, or [`SpatialError::UnknownObject`].
    ///
    /// # Errors
    /// Returns [`SpatialError::UnknownObject`] if `id` is not stored.
    fn require(&self, id: ObjectId) -> Result<&[f64]> {
        self.point(id).ok_or(SpatialError::UnknownObject(id))
    }
}

/// In-memory vector relation with sequentially allocated identifiers.
///
/// Identifiers are dense: the n-th inserted vector gets `ObjectId(n)`.
#[derive(Clone, Debug, Default)]
pub struct VectorRelation {
    dimensionality: usize,
    coords: Vec<f64>,
}

impl VectorRelation {
    /// Creates an empty relation for `dimensionality`-dimensional vectors.
    #[must_use]
    pub const fn new(dimensionality: usize) -> Self {
        Self { dimensionality, coords: Vec::new() }
    }

    /// Builds a relation from a list of vectors.
    ///
    /// # Errors
    /// Returns [`SpatialError::DimensionMismatch`] if the vectors do not all
    /// share the dimensionality of the first one, or
    /// [`SpatialError::InvalidCoordinate`] on NaN.
    pub fn from_vectors<I, V>(vectors: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: AsRef<[f64]>,
    {
        let mut iter = vectors.into_iter().peekable();
        let dimensionality = iter.peek().map_or(0, |v| v.as_ref().len());
        let mut relation = Self::new(dimensionality);
        for vector in iter {
            let _ = relation.push(vector.as_ref())?;
        }
        Ok(relation)
    }

    /// Appends a vector and returns its identifier.
    ///
    /// # Errors
    /// Returns [`SpatialError::DimensionMismatch`] or
    /// [`SpatialError::InvalidCoordinate`].
    pub fn push(&mut self, vector: &[f64]) -> Result<ObjectId> {
        SpatialError::check_dimension(self.dimensionality, vector.len())?;
        SpatialError::check_coordinates(vector)?;
        let id = ObjectId(self.len() as u64);
        self.coords.extend_from_slice(vector);
        Ok(id)
    }

    /// Number of stored vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        if self.dimensionality == 0 { 0 } else { self.coords.len() / self.dimensionality }
    }

    /// Whether the relation is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Iterates over `(id, coordinates)` in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &[f64])> + '_ {
        self.coords
            .chunks_exact(self.dimensionality.max(1))
            .enumerate()
            .map(|(i, chunk)| (ObjectId(i as u64), chunk))
    }
}

impl PointAccessor for VectorRelation {
    fn dimensionality(&self) -> usize {
        self.dimensionality
    }

    fn point(&self, id: ObjectId) -> Option<&[f64]> {
        let index = usize::try_from(id.0).ok()?;
        let start = index.checked_mul(self.dimensionality)?;
        self.coords.get(start..start + self.dimensionality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids() {
        let mut rel = VectorRelation::new(2);
        assert_eq!(rel.push(&[1.0, 2.0]).unwrap(), ObjectId(0));
        assert_eq!(rel.push(&[3.0, 4.0]).unwrap(), ObjectId(1));
        assert_eq!(rel.len(), 2);
        assert_eq!(rel.point(ObjectId(1)), Some(&[3.0, 4.0][..]));
        assert_eq!(rel.point(ObjectId(2)), None);
    }

    #[test]
    fn test_require_unknown() {
        let rel = VectorRelation::from_vectors([[0.0]]).unwrap();
        assert_eq!(rel.require(ObjectId(7)), Err(SpatialError::UnknownObject(ObjectId(7))));
    }

    #[test]
    fn test_push_wrong_dimension() {
        let mut rel = VectorRelation::new(3);
        assert!(matches!(rel.push(&[1.0]), Err(SpatialError::DimensionMismatch { .. })));
        assert!(rel.is_empty());
    }

    #[test]
    fn test_iter_order() {
        let rel = VectorRelation::from_vectors(vec![vec![0.0, 0.0], vec![1.0, 1.0]]).unwrap();
        let ids: Vec<_> = rel.iter().map(|(id, _)| id.get()).collect();
        assert_eq!(ids, vec![0, 1]);
    }
}
