//! Nodes and entries of the R*-tree.
//!
//! Nodes live in an arena owned by the tree and refer to each other by
//! [`NodeId`]. A node holds either leaf entries (points) or directory
//! entries (children with their bounding boxes), never a mix.

use std::fmt;

use crate::geometry::{BoundingBox, SpatialComparable};
use crate::relation::ObjectId;

/// Page identifier of a node inside its tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Index into the node arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {}", self.0)
    }
}

/// A stored point.
#[derive(Clone, Debug, PartialEq)]
pub struct LeafEntry {
    /// Identifier of the indexed object.
    pub id: ObjectId,
    /// Its coordinates.
    pub point: Box<[f64]>,
}

impl SpatialComparable for LeafEntry {
    fn dimensionality(&self) -> usize {
        self.point.len()
    }

    fn min(&self, d: usize) -> f64 {
        self.point[d]
    }

    fn max(&self, d: usize) -> f64 {
        self.point[d]
    }
}

/// Set of dimensions along which a subtree has been split.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct SplitHistory {
    words: Vec<u64>,
}

impl SplitHistory {
    pub(crate) fn insert(&mut self, dimension: usize) {
        let word = dimension / 64;
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << (dimension % 64);
    }

    pub(crate) fn contains(&self, dimension: usize) -> bool {
        self.words.get(dimension / 64).is_some_and(|&w| w & (1u64 << (dimension % 64)) != 0)
    }

    /// Dimensions present in every history, in increasing order.
    pub(crate) fn common<'a>(mut histories: impl Iterator<Item = &'a Self>) -> Vec<usize> {
        let Some(first) = histories.next() else {
            return Vec::new();
        };
        let mut words = first.words.clone();
        for history in histories {
            words.truncate(history.words.len());
            for (w, other) in words.iter_mut().zip(&history.words) {
                *w &= other;
            }
        }
        let mut dims = Vec::new();
        for (i, &w) in words.iter().enumerate() {
            for bit in 0..64 {
                if w & (1u64 << bit) != 0 {
                    dims.push(i * 64 + bit);
                }
            }
        }
        dims
    }
}

/// A child pointer with the minimal bounding box of the child's subtree.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectoryEntry {
    /// Page id of the child node.
    pub child: NodeId,
    /// Minimal cover of everything stored below `child`.
    pub mbr: BoundingBox,
    pub(crate) split_history: SplitHistory,
}

impl DirectoryEntry {
    pub(crate) fn new(child: NodeId, mbr: BoundingBox) -> Self {
        Self { child, mbr, split_history: SplitHistory::default() }
    }
}

impl SpatialComparable for DirectoryEntry {
    fn dimensionality(&self) -> usize {
        self.mbr.dimensionality()
    }

    fn min(&self, d: usize) -> f64 {
        self.mbr.min(d)
    }

    fn max(&self, d: usize) -> f64 {
        self.mbr.max(d)
    }
}

/// The homogeneous entry list of a node.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Entries {
    /// Points, in a leaf node.
    Leaf(Vec<LeafEntry>),
    /// Children, in a directory node.
    Directory(Vec<DirectoryEntry>),
}

/// A tree node (page).
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) parent: Option<NodeId>,
    /// Height above the leaves; leaves are level 0.
    pub(crate) level: u32,
    pub(crate) entries: Entries,
}

impl Node {
    pub(crate) const fn new_leaf(id: NodeId, parent: Option<NodeId>) -> Self {
        Self { id, parent, level: 0, entries: Entries::Leaf(Vec::new()) }
    }

    pub(crate) const fn new_directory(id: NodeId, parent: Option<NodeId>, level: u32) -> Self {
        Self { id, parent, level, entries: Entries::Directory(Vec::new()) }
    }

    /// Own page id.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Page id of the parent, `None` for the root.
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Height above the leaf level.
    #[must_use]
    pub const fn level(&self) -> u32 {
        self.level
    }

    /// Whether this node stores points.
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        matches!(self.entries, Entries::Leaf(_))
    }

    /// The entries of this node.
    #[must_use]
    pub const fn entries(&self) -> &Entries {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.entries {
            Entries::Leaf(e) => e.len(),
            Entries::Directory(e) => e.len(),
        }
    }

    /// Whether the node has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Minimal cover of the node's entries, `None` when empty.
    #[must_use]
    pub fn mbr(&self) -> Option<BoundingBox> {
        match &self.entries {
            Entries::Leaf(e) => BoundingBox::covering(e),
            Entries::Directory(e) => BoundingBox::covering(e),
        }
    }

    pub(crate) fn leaf_entries(&self) -> &[LeafEntry] {
        match &self.entries {
            Entries::Leaf(e) => e,
            Entries::Directory(_) => &[],
        }
    }

    pub(crate) fn directory_entries(&self) -> &[DirectoryEntry] {
        match &self.entries {
            Entries::Directory(e) => e,
            Entries::Leaf(_) => &[],
        }
    }

    pub(crate) fn leaf_entries_mut(&mut self) -> &mut Vec<LeafEntry> {
        match &mut self.entries {
            Entries::Leaf(e) => e,
            Entries::Directory(_) => panic!("{} is a directory node, expected a leaf", self.id),
        }
    }

    pub(crate) fn directory_entries_mut(&mut self) -> &mut Vec<DirectoryEntry> {
        match &mut self.entries {
            Entries::Directory(e) => e,
            Entries::Leaf(_) => panic!("{} is a leaf, expected a directory node", self.id),
        }
    }
}
