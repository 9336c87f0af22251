use tracing::trace;

use super::{Neighbor, NeighborList, RawMetric, sort_neighbors};
use crate::node::Entries;
use crate::rstar_tree::RStarTree;
use crate::statistics::{QueryCost, QueryKind};

/// Depth-first range query with an explicit stack. `query` and `radius` are
/// validated by the caller.
pub(crate) fn range<M: RawMetric>(tree: &RStarTree, metric: &M, query: &[f64], radius: f64) -> NeighborList {
    tree.stats().count_query(QueryKind::Range);
    let threshold = metric.to_raw(radius);
    let mut cost = QueryCost::default();
    let mut found = Vec::new();
    let mut stack = vec![tree.root_id()];

    while let Some(id) = stack.pop() {
        cost.node();
        match &tree.get_node(id).entries {
            Entries::Leaf(entries) => {
                for entry in entries {
                    cost.distance();
                    let raw = metric.raw_distance(query, &entry.point);
                    if raw <= threshold {
                        found.push(Neighbor { id: entry.id, distance: metric.from_raw(raw) });
                    }
                }
            }
            Entries::Directory(entries) => {
                for entry in entries {
                    cost.bound();
                    if metric.raw_min_dist(query, &entry.mbr) <= threshold {
                        stack.push(entry.child);
                    }
                }
            }
        }
    }

    sort_neighbors(&mut found);
    tree.stats().merge(&cost);
    trace!(radius, found = found.len(), nodes = cost.nodes_visited, "range query");
    NeighborList::new(found, cost)
}
