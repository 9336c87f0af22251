//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types from the crate.
//! Users can import everything they need with:
//!
//! ```
//! use spatial_knn::prelude::*;
//! ```

pub use crate::config::{BulkLoadStrategy, SplitStrategy, TreeConfig};
pub use crate::distance::{
    EuclideanDistance, ManhattanDistance, MaximumDistance, MinkowskiDistance, SpatialDistance,
    SquaredEuclideanDistance, WeightedEuclideanDistance,
};
pub use crate::error::{Result, SpatialError};
pub use crate::phtree::{PhTree, PhTreeF};
pub use crate::query::{Neighbor, NeighborList, PriorityCursor, QueryEngine};
pub use crate::relation::{ObjectId, PointAccessor, VectorRelation};
pub use crate::rstar_tree::RStarTree;
