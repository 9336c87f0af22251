//! Incremental nearest neighbor search with a shrinking cutoff.
//!
//! The cursor yields points in order of a lower bound of their distance.
//! The caller keeps the best match so far and lowers the cutoff to it, so
//! the search stops as soon as nothing closer can exist.
use spatial_knn::prelude::*;

fn main() {
    let points = (0..100_u64).map(|i| (ObjectId(i), [(i % 10) as f64, (i / 10) as f64]));
    let tree = RStarTree::bulk_load(2, TreeConfig::default().with_capacity(8), points).unwrap();

    let mut cursor = tree.priority_search(&[4.3, 6.8], &EuclideanDistance).unwrap();
    let mut best: Option<(ObjectId, f64)> = None;
    let mut examined = 0;
    while cursor.valid() {
        examined += 1;
        let distance = cursor.compute_exact_distance().unwrap();
        if best.is_none_or(|(_, d)| distance < d) {
            best = cursor.current_id().map(|id| (id, distance));
            cursor.decrease_cutoff(distance).unwrap();
        }
        cursor.advance();
    }
    let cost = cursor.cost();
    println!("closest: {best:?}");
    println!("examined {examined} of {} points, read {} nodes", tree.len(), cost.nodes_visited);
}
