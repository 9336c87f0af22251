//! R*-tree configuration.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SpatialError};

/// Bytes of per-page bookkeeping: page id, parent id, level, entry count.
const PAGE_OVERHEAD: usize = 16;
/// Bytes of an object id in a leaf entry.
const OBJECT_ID_SIZE: usize = 8;
/// Bytes of a child page id in a directory entry.
const PAGE_ID_SIZE: usize = 4;
/// Capacities below this work but degrade the tree to near-binary fan-out.
const SMALL_CAPACITY: usize = 10;

/// How an overflowing node is split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SplitStrategy {
    /// R* topological split: minimum margin axis, then minimum overlap.
    #[default]
    Topological,
    /// Topological split with a minimum-overlap fallback for directory nodes.
    ///
    /// When the topological split of a directory node leaves an overlap
    /// ratio `overlap / (volume1 + volume2)` above `max_overlap`, a split
    /// restricted to the common split dimensions of all entries is tried
    /// and kept if its ratio is smaller.
    XTree {
        /// Largest acceptable overlap ratio, in `[0, 1]`.
        max_overlap: f64,
    },
}

/// How [`crate::RStarTree::build`] partitions points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum BulkLoadStrategy {
    /// Sort-Tile-Recursive: sort by one axis, slice, recurse on the next.
    #[default]
    SortTileRecursive,
    /// Sort by the Hilbert key of each point and pack in order.
    Hilbert,
}

/// Configuration parameters for an R*-tree.
///
/// # Parameters
///
/// * `leaf_capacity` - Maximum number of points per leaf node (M).
/// * `directory_capacity` - Maximum number of children per directory node.
/// * `relative_min_fill` - Minimum fill m as a fraction of capacity,
///   `m = max(1, floor(M * relative_min_fill))`. At most 0.5.
/// * `reinsert_fraction` - Share of an overflowing node's entries that
///   are removed and reinserted before a split is attempted. 0 disables
///   forced reinsertion.
/// * `split` - Node split algorithm.
/// * `bulk_load` - Partitioning used by bulk loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Maximum entries in a leaf node.
    pub leaf_capacity: usize,
    /// Maximum entries in a directory node.
    pub directory_capacity: usize,
    /// Minimum fill as a fraction of capacity.
    pub relative_min_fill: f64,
    /// Share of entries removed for forced reinsertion.
    pub reinsert_fraction: f64,
    /// Node split algorithm.
    pub split: SplitStrategy,
    /// Bulk load partitioning.
    pub bulk_load: BulkLoadStrategy,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            leaf_capacity: 32,
            directory_capacity: 32,
            relative_min_fill: 0.4,
            reinsert_fraction: 0.3,
            split: SplitStrategy::Topological,
            bulk_load: BulkLoadStrategy::SortTileRecursive,
        }
    }
}

impl TreeConfig {
    /// Derives node capacities from a page size in bytes.
    ///
    /// A leaf entry is an object id plus `dimensionality` coordinates; a
    /// directory entry is a page id plus a bounding box.
    ///
    /// # Errors
    /// Returns [`SpatialError::InvalidConfig`] if a page holds two entries
    /// or fewer.
    pub fn for_page_size(page_size: usize, dimensionality: usize) -> Result<Self> {
        let payload = page_size.saturating_sub(PAGE_OVERHEAD);
        let leaf_capacity = payload / (OBJECT_ID_SIZE + 8 * dimensionality);
        let directory_capacity = payload / (PAGE_ID_SIZE + 16 * dimensionality);
        let config = Self { leaf_capacity, directory_capacity, ..Self::default() };
        config.validate().map_err(|_| {
            SpatialError::InvalidConfig(format!("page size of {page_size} bytes is too small"))
        })?;
        Ok(config)
    }

    /// Set the leaf capacity.
    #[must_use]
    pub const fn with_leaf_capacity(mut self, capacity: usize) -> Self {
        self.leaf_capacity = capacity;
        self
    }

    /// Set the directory capacity.
    #[must_use]
    pub const fn with_directory_capacity(mut self, capacity: usize) -> Self {
        self.directory_capacity = capacity;
        self
    }

    /// Set both capacities.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.leaf_capacity = capacity;
        self.directory_capacity = capacity;
        self
    }

    /// Set the relative minimum fill.
    #[must_use]
    pub const fn with_relative_min_fill(mut self, fill: f64) -> Self {
        self.relative_min_fill = fill;
        self
    }

    /// Set the reinsertion fraction.
    #[must_use]
    pub const fn with_reinsert_fraction(mut self, fraction: f64) -> Self {
        self.reinsert_fraction = fraction;
        self
    }

    /// Set the split strategy.
    #[must_use]
    pub const fn with_split(mut self, split: SplitStrategy) -> Self {
        self.split = split;
        self
    }

    /// Set the bulk load strategy.
    #[must_use]
    pub const fn with_bulk_load(mut self, bulk_load: BulkLoadStrategy) -> Self {
        self.bulk_load = bulk_load;
        self
    }

    /// Checks the configuration, logging a warning for very small pages.
    ///
    /// # Errors
    /// Returns [`SpatialError::InvalidConfig`] for capacities of two or
    /// less, a minimum fill outside `(0, 0.5]`, a reinsertion fraction
    /// outside `[0, 1)` or an overlap ratio outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        for (name, capacity) in
            [("leaf_capacity", self.leaf_capacity), ("directory_capacity", self.directory_capacity)]
        {
            if capacity <= 2 {
                return Err(SpatialError::InvalidConfig(format!(
                    "{name} must be greater than 2, got {capacity}"
                )));
            }
            if capacity < SMALL_CAPACITY {
                warn!(name, capacity, "node capacity is very small");
            }
        }
        if !(self.relative_min_fill > 0.0 && self.relative_min_fill <= 0.5) {
            return Err(SpatialError::InvalidConfig(format!(
                "relative_min_fill must be in (0, 0.5], got {}",
                self.relative_min_fill
            )));
        }
        if !(0.0..1.0).contains(&self.reinsert_fraction) {
            return Err(SpatialError::InvalidConfig(format!(
                "reinsert_fraction must be in [0, 1), got {}",
                self.reinsert_fraction
            )));
        }
        if let SplitStrategy::XTree { max_overlap } = self.split
            && !(0.0..=1.0).contains(&max_overlap)
        {
            return Err(SpatialError::InvalidConfig(format!(
                "max_overlap must be in [0, 1], got {max_overlap}"
            )));
        }
        Ok(())
    }

    /// Minimum entries of a non-root leaf.
    #[must_use]
    pub fn leaf_minimum(&self) -> usize {
        minimum(self.leaf_capacity, self.relative_min_fill)
    }

    /// Minimum entries of a non-root directory node.
    #[must_use]
    pub fn directory_minimum(&self) -> usize {
        minimum(self.directory_capacity, self.relative_min_fill)
    }
}

#[expect(clippy::cast_possible_truncation, reason = "capacities are small and the fill ratio is validated")]
fn minimum(capacity: usize, fill: f64) -> usize {
    ((capacity as f64 * fill).floor() as usize).clamp(1, capacity / 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TreeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.leaf_minimum(), 12);
        assert_eq!(config.directory_minimum(), 12);
    }

    #[test]
    fn test_minimum_is_at_least_one() {
        let config = TreeConfig::default().with_capacity(3).with_relative_min_fill(0.1);
        assert_eq!(config.leaf_minimum(), 1);
    }

    #[test]
    fn test_rejects_tiny_capacity() {
        let config = TreeConfig::default().with_leaf_capacity(2);
        assert!(matches!(config.validate(), Err(SpatialError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_bad_ratios() {
        assert!(TreeConfig::default().with_relative_min_fill(0.6).validate().is_err());
        assert!(TreeConfig::default().with_relative_min_fill(0.0).validate().is_err());
        assert!(TreeConfig::default().with_reinsert_fraction(1.0).validate().is_err());
        let xtree = TreeConfig::default().with_split(SplitStrategy::XTree { max_overlap: 1.5 });
        assert!(xtree.validate().is_err());
    }

    #[test]
    fn test_for_page_size() {
        let config = TreeConfig::for_page_size(4096, 2).unwrap();
        assert_eq!(config.leaf_capacity, (4096 - 16) / 24);
        assert_eq!(config.directory_capacity, (4096 - 16) / 36);
        assert!(TreeConfig::for_page_size(64, 8).is_err());
    }

    #[test]
    fn test_serde_defaults_fill_missing_fields() {
        let json = r#"{"leaf_capacity": 8, "split": {"kind": "x_tree", "max_overlap": 0.2}}"#;
        let config: TreeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.leaf_capacity, 8);
        assert_eq!(config.directory_capacity, 32);
        assert_eq!(config.split, SplitStrategy::XTree { max_overlap: 0.2 });

        let back: TreeConfig = serde_json::from_str(&serde_json::to_string(&config).unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
