//! Find the K nearest points to a query point.
use spatial_knn::prelude::*;

fn main() {
    let mut tree = RStarTree::new(2).unwrap();
    tree.insert(ObjectId(0), &[0.0, 0.0]).unwrap();
    tree.insert(ObjectId(1), &[2.0, 2.0]).unwrap();
    tree.insert(ObjectId(2), &[4.0, 4.0]).unwrap();
    tree.insert(ObjectId(3), &[6.0, 6.0]).unwrap();

    let results = tree.knn(&[2.5, 2.5], 2, &EuclideanDistance).unwrap();
    println!("2 nearest points: {:?}", results.ids());
    for neighbor in &results {
        println!("  {} at {:.3}", neighbor.id, neighbor.distance);
    }
}
