//! # spatial-knn - R*-tree and PH-tree Spatial Indexes
//!
//! Exact k-nearest-neighbor, range and incremental best-first ("priority")
//! similarity search over multidimensional points.
//!
//! ## Features
//!
//! - **R\*-tree**: balanced paged tree with forced reinsertion, topological
//!   splits, deletion and bulk loading (sort-tile-recursive or Hilbert order)
//! - **Branch-and-bound queries**: kNN, range and a priority cursor whose
//!   cutoff can be tightened while it runs
//! - **Pluggable distances**: Euclidean, squared Euclidean, Manhattan,
//!   maximum, Minkowski and weighted Euclidean, or any [`SpatialDistance`]
//! - **Squared shortcut**: Euclidean queries compare squared values and take
//!   one square root per reported distance
//! - **PH-tree**: bit-trie index over `u64` or `f64` keys with the same
//!   query family
//!
//! ## Quick Start
//!
//! ```rust
//! use spatial_knn::prelude::*;
//!
//! // Five points on a line
//! let points = [0.0, 1.0, 2.0, 3.0, 10.0];
//! let tree = RStarTree::bulk_load(
//!     1,
//!     TreeConfig::default(),
//!     points.iter().enumerate().map(|(i, &x)| (ObjectId(i as u64), [x])),
//! )
//! .unwrap();
//!
//! // Two nearest neighbors of 2.5
//! let nearest = tree.knn(&[2.5], 2, &EuclideanDistance).unwrap();
//! assert_eq!(nearest.ids(), vec![ObjectId(2), ObjectId(3)]);
//! assert_eq!(nearest[0].distance, 0.5);
//!
//! // Everything within 1.0 of 2.5
//! let close = tree.range(&[2.5], 1.0, &EuclideanDistance).unwrap();
//! assert_eq!(close.len(), 2);
//! ```
//!
//! ## How It Works
//!
//! Every query walks the tree best-first, ordered by a lower bound of the
//! distance from the query to each node's bounding box. A node is skipped as
//! soon as its bound exceeds the current k-th best distance, the radius, or
//! the cursor cutoff. Distance functions only need to provide a sound lower
//! bound; the triangle inequality is never used.
//!
//! [`query_engine`] picks the implementation for a distance function: the
//! canonical [`EuclideanDistance`] gets the squared engine, everything else
//! the generic one.

mod bulk;
pub mod config;
pub mod distance;
pub mod error;
pub mod geometry;
mod hilbert;
pub mod node;
pub mod phtree;
pub mod prelude;
pub mod query;
pub mod relation;
pub mod rstar_tree;
mod split;
pub mod statistics;

#[cfg(test)]
mod integration_test;

pub use config::{BulkLoadStrategy, SplitStrategy, TreeConfig};
pub use distance::{
    EuclideanDistance, ManhattanDistance, MaximumDistance, MetricKind, MinkowskiDistance, SpatialDistance,
    SquaredEuclideanDistance, WeightedEuclideanDistance, metric_kind,
};
pub use error::{Result, SpatialError};
pub use geometry::{BoundingBox, SpatialComparable};
pub use node::NodeId;
pub use phtree::{PhTree, PhTreeF};
pub use query::{EngineKind, Neighbor, NeighborList, PriorityCursor, QueryEngine, query_engine};
pub use relation::{ObjectId, PointAccessor, VectorRelation};
pub use rstar_tree::{MAX_DIMENSIONALITY, RStarTree};
pub use statistics::{QueryCost, Statistics, StatisticsSnapshot};
