use tracing::trace;

use super::knn_heap::KnnHeap;
use super::{NeighborList, NodeQueue, RawMetric};
use crate::node::{Entries, Node};
use crate::rstar_tree::RStarTree;
use crate::statistics::{QueryCost, QueryKind};

struct KnnSearch<'a, M> {
    tree: &'a RStarTree,
    metric: &'a M,
    query: &'a [f64],
    candidates: KnnHeap,
    queue: NodeQueue,
    cost: QueryCost,
}

impl<M: RawMetric> KnnSearch<'_, M> {
    /// Scores a leaf, or queues the children of a directory node. Children
    /// whose bound is zero contain the query and are expanded right away.
    fn expand(&mut self, node: &Node) {
        self.cost.node();
        match &node.entries {
            Entries::Leaf(entries) => {
                for entry in entries {
                    self.cost.distance();
                    let _ = self.candidates.insert(self.metric.raw_distance(self.query, &entry.point), entry.id);
                }
            }
            Entries::Directory(entries) => {
                for entry in entries {
                    self.cost.bound();
                    let bound = self.metric.raw_min_dist(self.query, &entry.mbr);
                    if bound == 0.0 {
                        self.expand(self.tree.get_node(entry.child));
                    } else if bound <= self.candidates.max_distance() {
                        self.queue.push(bound, entry.child);
                    }
                }
            }
        }
    }
}

/// Best-first kNN. `query` and `k` are validated by the caller.
pub(crate) fn knn<M: RawMetric>(tree: &RStarTree, metric: &M, query: &[f64], k: usize) -> NeighborList {
    tree.stats().count_query(QueryKind::Knn);
    if tree.is_empty() {
        return NeighborList::default();
    }
    let mut search = KnnSearch {
        tree,
        metric,
        query,
        candidates: KnnHeap::new(k),
        queue: NodeQueue::default(),
        cost: QueryCost::default(),
    };
    search.expand(tree.root());
    while let Some((bound, id)) = search.queue.pop() {
        if bound > search.candidates.max_distance() {
            break;
        }
        search.expand(tree.get_node(id));
    }

    let cost = search.cost;
    tree.stats().merge(&cost);
    let neighbors = search.candidates.into_neighbors(metric);
    trace!(k, found = neighbors.len(), nodes = cost.nodes_visited, distances = cost.distance_computations, "knn query");
    NeighborList::new(neighbors, cost)
}
