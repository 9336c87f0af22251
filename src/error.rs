//! Error types for index construction and queries.

use thiserror::Error;

use crate::relation::ObjectId;

/// Errors returned by index construction and query operations.
///
/// All variants are argument errors: they are fatal to the call that
/// produced them, never to the index, which stays usable afterwards.
/// Structural corruption (a page id that resolves to no node) is not
/// represented here; it panics, since no result computed from a broken
/// tree can be trusted.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum SpatialError {
    /// Dimensionality of a point or box does not match the index.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality of the index.
        expected: usize,
        /// Dimensionality of the offending argument.
        actual: usize,
    },

    /// Dimensionality outside of the supported range.
    #[error("invalid dimensionality {actual}: must be within 1..={max}")]
    InvalidDimensionality {
        /// The requested dimensionality.
        actual: usize,
        /// The largest supported dimensionality.
        max: usize,
    },

    /// A kNN query was issued with `k < 1`.
    #[error("invalid k: {0}, must be at least 1")]
    InvalidK(usize),

    /// A range query radius that is negative or NaN.
    #[error("invalid radius: {0}")]
    InvalidRadius(f64),

    /// A priority search cutoff may only decrease.
    #[error("cutoff may only decrease: current {current}, requested {requested}")]
    CutoffIncreased {
        /// The cutoff currently in effect.
        current: f64,
        /// The rejected new cutoff.
        requested: f64,
    },

    /// A bounding box with `lo[d] > hi[d]` or a NaN coordinate.
    #[error("invalid bounding box in dimension {dimension}: [{lo}, {hi}]")]
    InvalidBoundingBox {
        /// First offending dimension.
        dimension: usize,
        /// Lower coordinate.
        lo: f64,
        /// Upper coordinate.
        hi: f64,
    },

    /// A coordinate that is NaN.
    #[error("invalid coordinate at index {index}: {value}")]
    InvalidCoordinate {
        /// Index of the coordinate.
        index: usize,
        /// The coordinate value.
        value: f64,
    },

    /// Tree configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A distance function parameter outside of its domain.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A query by identifier referenced an unknown object.
    #[error("unknown object: {0}")]
    UnknownObject(ObjectId),
}

impl SpatialError {
    /// Checks that `actual` matches the expected dimensionality.
    pub(crate) fn check_dimension(expected: usize, actual: usize) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::DimensionMismatch { expected, actual })
        }
    }

    /// Rejects NaN coordinates.
    pub(crate) fn check_coordinates(point: &[f64]) -> Result<()> {
        match point.iter().position(|v| v.is_nan()) {
            Some(index) => Err(Self::InvalidCoordinate { index, value: point[index] }),
            None => Ok(()),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SpatialError>;
