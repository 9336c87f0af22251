//! Performance profiling example for tree building
//!
//! Compares incremental insertion with both bulk loading strategies.
//! Designed to be used with low-level profilers like `samply`:
//!
//! ```bash
//! samply record cargo run --release --example perf_build
//! ```

use rand::Rng;
use rand::SeedableRng;
use spatial_knn::prelude::*;
use std::time::Instant;

fn main() {
    println!("spatial-knn Build Performance Benchmark");
    println!("=======================================\n");

    let num_items = 500_000;
    let dim = 3;
    let mut rng = rand::rngs::StdRng::seed_from_u64(12_345);
    let points: Vec<Vec<f64>> =
        (0..num_items).map(|_| (0..dim).map(|_| rng.random_range(0.0..1000.0)).collect()).collect();

    for strategy in [BulkLoadStrategy::SortTileRecursive, BulkLoadStrategy::Hilbert] {
        let start = Instant::now();
        let tree = RStarTree::bulk_load(
            dim,
            TreeConfig::default().with_bulk_load(strategy),
            points.iter().enumerate().map(|(i, p)| (ObjectId(i as u64), p)),
        )
        .unwrap();
        println!(
            "bulk load {:?}: {:>10.2}ms, height {}, {} nodes",
            strategy,
            start.elapsed().as_secs_f64() * 1000.0,
            tree.height(),
            tree.node_count()
        );
    }

    for (name, config) in [
        ("insert (R*)", TreeConfig::default()),
        ("insert (X-tree split)", TreeConfig::default().with_split(SplitStrategy::XTree { max_overlap: 0.2 })),
        ("insert (no reinsert)", TreeConfig::default().with_reinsert_fraction(0.0)),
    ] {
        let start = Instant::now();
        let mut tree = RStarTree::with_config(dim, config).unwrap();
        for (i, p) in points.iter().enumerate() {
            tree.insert(ObjectId(i as u64), p).unwrap();
        }
        println!(
            "{:<22} {:>10.2}ms, height {}, {} nodes",
            name,
            start.elapsed().as_secs_f64() * 1000.0,
            tree.height(),
            tree.node_count()
        );
    }
}
