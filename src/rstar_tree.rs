//! Dynamic R*-tree over points.
//!
//! Nodes are stored in an arena and addressed by [`NodeId`]. Every non-root
//! node holds between `m` and `M` entries; the root holds up to `M`, and is
//! an empty leaf only when the tree is empty. Directory entries always carry
//! the minimal bounding box of their subtree.

use tracing::debug;

use crate::bulk::partition;
use crate::config::{SplitStrategy, TreeConfig};
use crate::distance::SpatialDistance;
use crate::error::{Result, SpatialError};
use crate::geometry::{BoundingBox, SpatialComparable};
use crate::node::{DirectoryEntry, Entries, LeafEntry, Node, NodeId, SplitHistory};
use crate::query::{NeighborList, PriorityCursor, QueryEngine, query_engine};
use crate::relation::{ObjectId, PointAccessor, VectorRelation};
use crate::split::{Split, minimum_overlap_split, topological_split};
use crate::statistics::{Statistics, StatisticsSnapshot};

/// Largest supported dimensionality.
pub const MAX_DIMENSIONALITY: usize = 1 << 16;

/// An entry waiting to be placed at some level of the tree.
enum Pending {
    Leaf(LeafEntry),
    Directory(DirectoryEntry),
}

impl Pending {
    fn mbr(&self) -> BoundingBox {
        match self {
            Self::Leaf(e) => BoundingBox::from_point(&e.point),
            Self::Directory(e) => e.mbr.clone(),
        }
    }
}

/// Dynamic R*-tree with forced reinsertion, topological splits and bulk
/// loading.
///
/// Queries go through [`RStarTree::query`], which selects the fastest
/// implementation for the given distance function.
///
/// # Example
///
/// ```
/// use spatial_knn::prelude::*;
///
/// let mut tree = RStarTree::new(2).unwrap();
/// tree.add(ObjectId(0), &[0.0, 0.0]).unwrap();
/// tree.add(ObjectId(1), &[1.0, 1.0]).unwrap();
/// tree.add(ObjectId(2), &[5.0, 5.0]).unwrap();
/// tree.build();
///
/// let neighbors = tree.knn(&[0.9, 0.9], 2, &EuclideanDistance).unwrap();
/// assert_eq!(neighbors[0].id, ObjectId(1));
/// assert_eq!(neighbors[1].id, ObjectId(0));
/// ```
#[derive(Debug)]
pub struct RStarTree {
    dimensionality: usize,
    config: TreeConfig,
    leaf_minimum: usize,
    directory_minimum: usize,
    nodes: Vec<Option<Node>>,
    free: Vec<NodeId>,
    root: NodeId,
    len: usize,
    pending: Vec<LeafEntry>,
    statistics: Statistics,
}

impl RStarTree {
    /// Creates an empty tree with the default configuration.
    ///
    /// # Errors
    /// Returns [`SpatialError::InvalidDimensionality`] for 0 or more than
    /// [`MAX_DIMENSIONALITY`] dimensions.
    pub fn new(dimensionality: usize) -> Result<Self> {
        Self::with_config(dimensionality, TreeConfig::default())
    }

    /// Creates an empty tree.
    ///
    /// # Errors
    /// Returns [`SpatialError::InvalidDimensionality`] or
    /// [`SpatialError::InvalidConfig`].
    pub fn with_config(dimensionality: usize, config: TreeConfig) -> Result<Self> {
        if !(1..=MAX_DIMENSIONALITY).contains(&dimensionality) {
            return Err(SpatialError::InvalidDimensionality { actual: dimensionality, max: MAX_DIMENSIONALITY });
        }
        config.validate()?;
        let mut tree = Self {
            dimensionality,
            leaf_minimum: config.leaf_minimum(),
            directory_minimum: config.directory_minimum(),
            config,
            nodes: Vec::new(),
            free: Vec::new(),
            root: NodeId(0),
            len: 0,
            pending: Vec::new(),
            statistics: Statistics::default(),
        };
        tree.root = tree.alloc(Node::new_leaf(NodeId(0), None));
        Ok(tree)
    }

    /// Bulk loads a tree from `(id, point)` pairs.
    ///
    /// # Errors
    /// Returns the errors of [`RStarTree::with_config`] and
    /// [`RStarTree::add`].
    pub fn bulk_load<I, P>(dimensionality: usize, config: TreeConfig, points: I) -> Result<Self>
    where
        I: IntoIterator<Item = (ObjectId, P)>,
        P: AsRef<[f64]>,
    {
        let mut tree = Self::with_config(dimensionality, config)?;
        for (id, point) in points {
            tree.add(id, point.as_ref())?;
        }
        tree.build();
        Ok(tree)
    }

    /// Bulk loads every vector of `relation`.
    ///
    /// # Errors
    /// Returns [`SpatialError::InvalidDimensionality`] for an empty relation
    /// without dimensionality, or [`SpatialError::InvalidConfig`].
    pub fn from_relation(relation: &VectorRelation, config: TreeConfig) -> Result<Self> {
        Self::bulk_load(relation.dimensionality(), config, relation.iter())
    }

    /// Queues a point for the next [`RStarTree::build`].
    ///
    /// Queued points are not visible to queries until the tree is built.
    ///
    /// # Errors
    /// Returns [`SpatialError::DimensionMismatch`] or
    /// [`SpatialError::InvalidCoordinate`].
    pub fn add(&mut self, id: ObjectId, point: &[f64]) -> Result<()> {
        self.check_point(point)?;
        self.pending.push(LeafEntry { id, point: point.into() });
        Ok(())
    }

    /// Rebuilds the tree from its current contents plus all queued points.
    pub fn build(&mut self) {
        let mut entries: Vec<LeafEntry> = Vec::with_capacity(self.len + self.pending.len());
        for node in self.nodes.drain(..).flatten() {
            if let Entries::Leaf(leaf) = node.entries {
                entries.extend(leaf);
            }
        }
        entries.append(&mut self.pending);
        self.free.clear();
        self.bulk_load_entries(entries);
    }

    fn bulk_load_entries(&mut self, entries: Vec<LeafEntry>) {
        self.len = entries.len();
        if entries.is_empty() {
            self.root = self.alloc(Node::new_leaf(NodeId(0), None));
            return;
        }
        let strategy = self.config.bulk_load;

        let mut level_entries = Vec::new();
        for group in partition(entries, self.config.leaf_capacity, strategy) {
            let id = self.alloc(Node { id: NodeId(0), parent: None, level: 0, entries: Entries::Leaf(group) });
            level_entries.push(DirectoryEntry::new(id, self.node_mbr(id)));
        }

        let mut level = 0;
        while level_entries.len() > 1 {
            level += 1;
            let mut parents = Vec::new();
            for group in partition(level_entries, self.config.directory_capacity, strategy) {
                let children: Vec<NodeId> = group.iter().map(|e| e.child).collect();
                let id = self.alloc(Node { id: NodeId(0), parent: None, level, entries: Entries::Directory(group) });
                for child in children {
                    self.node_mut(child).parent = Some(id);
                }
                parents.push(DirectoryEntry::new(id, self.node_mbr(id)));
            }
            level_entries = parents;
        }
        self.root = level_entries[0].child;
        debug!(
            objects = self.len,
            height = self.height(),
            nodes = self.node_count(),
            ?strategy,
            "bulk loaded tree"
        );
    }

    /// Inserts a point with R* forced reinsertion and splitting.
    ///
    /// # Errors
    /// Returns [`SpatialError::DimensionMismatch`] or
    /// [`SpatialError::InvalidCoordinate`].
    pub fn insert(&mut self, id: ObjectId, point: &[f64]) -> Result<()> {
        self.check_point(point)?;
        self.insert_leaf_entry(LeafEntry { id, point: point.into() });
        self.len += 1;
        Ok(())
    }

    /// Removes the entry with `id` stored at `point`.
    ///
    /// Returns whether an entry was removed. Underfull nodes on the path are
    /// dissolved and their points reinserted.
    ///
    /// # Errors
    /// Returns [`SpatialError::DimensionMismatch`] or
    /// [`SpatialError::InvalidCoordinate`].
    pub fn delete(&mut self, id: ObjectId, point: &[f64]) -> Result<bool> {
        self.check_point(point)?;
        let Some((leaf, index)) = self.find_leaf(self.root, id, point) else {
            return Ok(false);
        };
        let _ = self.node_mut(leaf).leaf_entries_mut().remove(index);
        self.len -= 1;
        self.condense(leaf);
        debug!(%id, remaining = self.len, "deleted object");
        Ok(true)
    }

    /// Number of indexed points, excluding queued ones.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether no point is indexed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of points queued by [`RStarTree::add`].
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Dimensionality of the indexed points.
    #[must_use]
    pub const fn dimensionality(&self) -> usize {
        self.dimensionality
    }

    /// The configuration the tree was created with.
    #[must_use]
    pub const fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Page id of the root.
    #[must_use]
    pub const fn root_id(&self) -> NodeId {
        self.root
    }

    /// The root node.
    #[must_use]
    pub fn root(&self) -> &Node {
        self.get_node(self.root)
    }

    /// Number of levels; 1 for a tree whose root is a leaf.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.root().level + 1
    }

    /// Number of live nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Minimal box covering every indexed point.
    #[must_use]
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.root().mbr()
    }

    /// Resolves a page id.
    ///
    /// # Panics
    /// Panics if `id` does not refer to a live node of this tree.
    #[must_use]
    pub fn get_node(&self, id: NodeId) -> &Node {
        self.nodes
            .get(id.index())
            .and_then(Option::as_ref)
            .unwrap_or_else(|| panic!("{id} resolves to no node"))
    }

    /// All indexed points, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &LeafEntry> + '_ {
        self.nodes.iter().flatten().flat_map(Node::leaf_entries)
    }

    /// Current query counters.
    #[must_use]
    pub fn statistics(&self) -> StatisticsSnapshot {
        self.statistics.snapshot()
    }

    /// Resets the query counters.
    pub fn reset_statistics(&self) {
        self.statistics.reset();
    }

    pub(crate) const fn stats(&self) -> &Statistics {
        &self.statistics
    }

    /// Query engine for `distance`.
    #[must_use]
    pub fn query<'a>(&'a self, distance: &'a dyn SpatialDistance) -> QueryEngine<'a> {
        query_engine(self, distance)
    }

    /// The `k` nearest neighbors of `query`.
    ///
    /// # Errors
    /// See [`QueryEngine::knn`].
    pub fn knn(&self, query: &[f64], k: usize, distance: &dyn SpatialDistance) -> Result<NeighborList> {
        self.query(distance).knn(query, k)
    }

    /// Every point within `radius` of `query`.
    ///
    /// # Errors
    /// See [`QueryEngine::range`].
    pub fn range(&self, query: &[f64], radius: f64, distance: &dyn SpatialDistance) -> Result<NeighborList> {
        self.query(distance).range(query, radius)
    }

    /// Starts an incremental best-first search from `query`.
    ///
    /// # Errors
    /// See [`QueryEngine::priority_search`].
    pub fn priority_search<'a>(
        &'a self,
        query: &[f64],
        distance: &'a dyn SpatialDistance,
    ) -> Result<PriorityCursor<'a>> {
        self.query(distance).priority_search(query)
    }

    pub(crate) fn check_point(&self, point: &[f64]) -> Result<()> {
        SpatialError::check_dimension(self.dimensionality, point.len())?;
        SpatialError::check_coordinates(point)
    }

    // ========================================================================
    // Arena
    // ========================================================================

    fn alloc(&mut self, mut node: Node) -> NodeId {
        if let Some(id) = self.free.pop() {
            node.id = id;
            self.nodes[id.index()] = Some(node);
            id
        } else {
            let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or_else(|_| panic!("node arena is full")));
            node.id = id;
            self.nodes.push(Some(node));
            id
        }
    }

    fn release(&mut self, id: NodeId) -> Node {
        let node = self.nodes[id.index()].take().unwrap_or_else(|| panic!("{id} released twice"));
        self.free.push(id);
        node
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("{id} resolves to no node"))
    }

    fn node_mbr(&self, id: NodeId) -> BoundingBox {
        self.get_node(id).mbr().unwrap_or_else(|| panic!("{id} is empty but not the root"))
    }

    const fn capacity(&self, leaf: bool) -> usize {
        if leaf { self.config.leaf_capacity } else { self.config.directory_capacity }
    }

    const fn minimum(&self, leaf: bool) -> usize {
        if leaf { self.leaf_minimum } else { self.directory_minimum }
    }

    /// Index of `child`'s entry in `parent`.
    fn slot(&self, parent: NodeId, child: NodeId) -> usize {
        self.get_node(parent)
            .directory_entries()
            .iter()
            .position(|e| e.child == child)
            .unwrap_or_else(|| panic!("{child} is not a child of {parent}"))
    }

    /// Recomputes the box of `child` in `parent`.
    fn refresh_entry(&mut self, parent: NodeId, child: NodeId) {
        let mbr = self.node_mbr(child);
        let slot = self.slot(parent, child);
        self.node_mut(parent).directory_entries_mut()[slot].mbr = mbr;
    }

    fn refresh_path(&mut self, mut node: NodeId) {
        while let Some(parent) = self.get_node(node).parent {
            self.refresh_entry(parent, node);
            node = parent;
        }
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    fn insert_leaf_entry(&mut self, entry: LeafEntry) {
        // one bit per level: forced reinsertion happens at most once per
        // level and top-level insertion
        let mut reinserted = 0u64;
        self.insert_at(Pending::Leaf(entry), 0, &mut reinserted);
    }

    fn insert_at(&mut self, entry: Pending, level: u32, reinserted: &mut u64) {
        let target = self.choose_subtree(&entry.mbr(), level);
        match entry {
            Pending::Leaf(e) => self.node_mut(target).leaf_entries_mut().push(e),
            Pending::Directory(e) => {
                let child = e.child;
                self.node_mut(target).directory_entries_mut().push(e);
                self.node_mut(child).parent = Some(target);
            }
        }
        self.adjust_path(target, reinserted);
    }

    /// Descends from the root to the node at `level` best suited for `mbr`.
    fn choose_subtree(&self, mbr: &BoundingBox, level: u32) -> NodeId {
        let mut current = self.root;
        loop {
            let node = self.get_node(current);
            if node.level <= level {
                return current;
            }
            let entries = node.directory_entries();
            current = entries[choose_entry(entries, mbr, node.level == 1)].child;
        }
    }

    /// Handles overflow and refreshes bounding boxes from `start` to the root.
    fn adjust_path(&mut self, start: NodeId, reinserted: &mut u64) {
        let mut current = start;
        loop {
            let node = self.get_node(current);
            let (len, leaf, level, parent) = (node.len(), node.is_leaf(), node.level, node.parent);
            if len > self.capacity(leaf) {
                let bit = 1u64 << level.min(63);
                if parent.is_some() && *reinserted & bit == 0 && self.reinsert_count(len, leaf) > 0 {
                    *reinserted |= bit;
                    self.reinsert(current, reinserted);
                    return;
                }
                self.split(current);
            } else if let Some(parent) = parent {
                self.refresh_entry(parent, current);
            }
            match parent {
                Some(parent) => current = parent,
                None => return,
            }
        }
    }

    #[expect(clippy::cast_possible_truncation, reason = "entry counts are small")]
    fn reinsert_count(&self, len: usize, leaf: bool) -> usize {
        let count = (self.config.reinsert_fraction * len as f64).floor() as usize;
        count.min(len - self.minimum(leaf))
    }

    /// Removes the entries farthest from the node center and inserts them
    /// again, closest first.
    fn reinsert(&mut self, node_id: NodeId, reinserted: &mut u64) {
        let center = self.node_mbr(node_id).centroid();
        let node = self.get_node(node_id);
        let (count, level) = (self.reinsert_count(node.len(), node.is_leaf()), node.level);

        // farthest first
        let removed: Vec<Pending> = match &mut self.node_mut(node_id).entries {
            Entries::Leaf(entries) => {
                entries.sort_by(|a, b| center_distance(&center, b).total_cmp(&center_distance(&center, a)));
                let keep = entries.split_off(count);
                std::mem::replace(entries, keep).into_iter().rev().map(Pending::Leaf).collect()
            }
            Entries::Directory(entries) => {
                entries.sort_by(|a, b| center_distance(&center, b).total_cmp(&center_distance(&center, a)));
                let keep = entries.split_off(count);
                std::mem::replace(entries, keep).into_iter().rev().map(Pending::Directory).collect()
            }
        };
        debug!(node = %node_id, level, count, "forced reinsertion");

        self.refresh_path(node_id);
        for entry in removed {
            self.insert_at(entry, level, reinserted);
        }
    }

    fn directory_split(&self, entries: &[DirectoryEntry]) -> Split {
        let topological = topological_split(entries, self.directory_minimum);
        let SplitStrategy::XTree { max_overlap } = self.config.split else {
            return topological;
        };
        if topological.overlap_ratio() <= max_overlap {
            return topological;
        }
        let mut axes = SplitHistory::common(entries.iter().map(|e| &e.split_history));
        axes.retain(|&d| d < self.dimensionality);
        if axes.is_empty() {
            axes = (0..self.dimensionality).collect();
        }
        let candidate = minimum_overlap_split(entries, self.directory_minimum, &axes);
        if candidate.overlap_ratio() < topological.overlap_ratio() {
            debug!(
                topological = topological.overlap_ratio(),
                minimum_overlap = candidate.overlap_ratio(),
                axis = candidate.axis,
                "using minimum overlap split"
            );
            candidate
        } else {
            topological
        }
    }

    /// Splits an overflowing node into itself and a new sibling, growing a
    /// new root if needed.
    fn split(&mut self, node_id: NodeId) {
        let node = self.get_node(node_id);
        let (level, parent) = (node.level, node.parent);
        let mut history = match parent {
            Some(p) => self.get_node(p).directory_entries()[self.slot(p, node_id)].split_history.clone(),
            None => SplitHistory::default(),
        };

        let entries = std::mem::replace(&mut self.node_mut(node_id).entries, Entries::Leaf(Vec::new()));
        let (left, right, axis) = match entries {
            Entries::Leaf(entries) => {
                let split = topological_split(&entries, self.leaf_minimum);
                let (left, right) = split.apply(entries);
                (Entries::Leaf(left), Entries::Leaf(right), split.axis)
            }
            Entries::Directory(entries) => {
                let split = self.directory_split(&entries);
                let (left, right) = split.apply(entries);
                (Entries::Directory(left), Entries::Directory(right), split.axis)
            }
        };
        self.node_mut(node_id).entries = left;
        let sibling = self.alloc(Node { id: NodeId(0), parent, level, entries: right });
        let moved: Vec<NodeId> = self.get_node(sibling).directory_entries().iter().map(|e| e.child).collect();
        for child in moved {
            self.node_mut(child).parent = Some(sibling);
        }

        history.insert(axis);
        let left_entry =
            DirectoryEntry { child: node_id, mbr: self.node_mbr(node_id), split_history: history.clone() };
        let right_entry = DirectoryEntry { child: sibling, mbr: self.node_mbr(sibling), split_history: history };
        match parent {
            Some(parent) => {
                let slot = self.slot(parent, node_id);
                let siblings = self.node_mut(parent).directory_entries_mut();
                siblings[slot] = left_entry;
                siblings.push(right_entry);
            }
            None => {
                let root = self.alloc(Node::new_directory(NodeId(0), None, level + 1));
                self.node_mut(root).entries = Entries::Directory(vec![left_entry, right_entry]);
                self.node_mut(node_id).parent = Some(root);
                self.node_mut(sibling).parent = Some(root);
                self.root = root;
                debug!(height = level + 2, "root split, tree grew");
            }
        }
        debug!(node = %node_id, sibling = %sibling, level, axis, "split node");
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    fn find_leaf(&self, node_id: NodeId, id: ObjectId, point: &[f64]) -> Option<(NodeId, usize)> {
        match &self.get_node(node_id).entries {
            Entries::Leaf(entries) => {
                entries.iter().position(|e| e.id == id && *e.point == *point).map(|index| (node_id, index))
            }
            Entries::Directory(entries) => entries
                .iter()
                .filter(|e| e.mbr.contains_point(point))
                .find_map(|e| self.find_leaf(e.child, id, point)),
        }
    }

    /// Dissolves underfull nodes from `leaf` upwards, shrinks the root and
    /// reinserts the orphaned points.
    fn condense(&mut self, leaf: NodeId) {
        let mut orphans = Vec::new();
        let mut current = leaf;
        while let Some(parent) = self.get_node(current).parent {
            let node = self.get_node(current);
            if node.len() < self.minimum(node.is_leaf()) {
                let slot = self.slot(parent, current);
                let _ = self.node_mut(parent).directory_entries_mut().remove(slot);
                self.dissolve(current, &mut orphans);
            } else {
                self.refresh_entry(parent, current);
            }
            current = parent;
        }

        loop {
            let root = self.get_node(self.root);
            if root.is_leaf() {
                break;
            }
            match root.directory_entries() {
                [only] => {
                    let child = only.child;
                    let _ = self.release(self.root);
                    self.node_mut(child).parent = None;
                    self.root = child;
                    debug!(height = self.height(), "root collapsed");
                }
                [] => {
                    let _ = self.release(self.root);
                    self.root = self.alloc(Node::new_leaf(NodeId(0), None));
                    break;
                }
                _ => break,
            }
        }

        if !orphans.is_empty() {
            debug!(count = orphans.len(), "reinserting orphaned points");
            for entry in orphans {
                self.insert_leaf_entry(entry);
            }
        }
    }

    /// Releases the subtree below `node_id`, collecting its points.
    fn dissolve(&mut self, node_id: NodeId, out: &mut Vec<LeafEntry>) {
        match self.release(node_id).entries {
            Entries::Leaf(entries) => out.extend(entries),
            Entries::Directory(entries) => {
                for entry in entries {
                    self.dissolve(entry.child, out);
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        let root = self.root();
        assert!(root.parent.is_none(), "root has a parent");
        assert!(root.len() <= self.capacity(root.is_leaf()), "root overflows");
        assert!(root.is_leaf() || root.len() >= 2, "directory root with a single child");
        let counted = self.check_subtree(self.root, None);
        assert_eq!(counted, self.len, "stored points do not match len");
        assert_eq!(self.iter().count(), self.len, "unreachable leaf entries");
    }

    #[cfg(test)]
    fn check_subtree(&self, id: NodeId, expected: Option<&BoundingBox>) -> usize {
        let node = self.get_node(id);
        assert_eq!(node.id, id, "node stored under the wrong id");
        if expected.is_some() {
            let (min, max) = (self.minimum(node.is_leaf()), self.capacity(node.is_leaf()));
            assert!((min..=max).contains(&node.len()), "{id} holds {} entries, allowed {min}..={max}", node.len());
            assert_eq!(node.mbr().as_ref(), expected, "{id} has a stale bounding box");
        }
        match &node.entries {
            Entries::Leaf(entries) => {
                assert_eq!(node.level, 0, "leaf above level 0");
                entries.len()
            }
            Entries::Directory(entries) => entries
                .iter()
                .map(|e| {
                    let child = self.get_node(e.child);
                    assert_eq!(child.parent, Some(id), "{} has a wrong parent", e.child);
                    assert_eq!(child.level + 1, node.level, "unbalanced tree");
                    self.check_subtree(e.child, Some(&e.mbr))
                })
                .sum(),
        }
    }
}

/// Squared distance between `center` and the center of `item`.
fn center_distance<T: SpatialComparable>(center: &[f64], item: &T) -> f64 {
    center.iter().enumerate().map(|(d, c)| (item.center(d) - c).powi(2)).sum()
}

/// R* subtree choice: a containing child of least volume, else least
/// overlap enlargement for leaf children, else least volume enlargement;
/// remaining ties go to the smaller volume, then the earlier entry.
fn choose_entry(entries: &[DirectoryEntry], mbr: &BoundingBox, children_are_leaves: bool) -> usize {
    let mut containing: Option<(usize, f64)> = None;
    for (i, e) in entries.iter().enumerate() {
        if e.mbr.contains(mbr) {
            let volume = e.mbr.volume();
            if containing.is_none_or(|(_, best)| volume < best) {
                containing = Some((i, volume));
            }
        }
    }
    if let Some((i, _)) = containing {
        return i;
    }

    let mut best = 0;
    let mut best_key = (f64::INFINITY, f64::INFINITY, f64::INFINITY);
    for (i, e) in entries.iter().enumerate() {
        let grown = e.mbr.union(mbr);
        let overlap = if children_are_leaves {
            entries
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, other)| grown.overlap(&other.mbr) - e.mbr.overlap(&other.mbr))
                .sum()
        } else {
            0.0
        };
        let volume = e.mbr.volume();
        let key = (overlap, grown.volume() - volume, volume);
        if key < best_key {
            best_key = key;
            best = i;
        }
    }
    best
}
